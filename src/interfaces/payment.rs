//! Payment processor capability interface.
//!
//! The core never calls a vendor SDK. A purchase routes through one of
//! three processor capabilities; webhook confirmation later settles the
//! pending transaction through the points engine.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::records::PaymentMethod;

/// Processor capability classes the core can route a charge to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorKind {
    /// Card-style gateways (may settle synchronously).
    Card,
    /// Wallet/transfer services settled out-of-band.
    Alternative,
    /// Crypto gateways settled out-of-band.
    Crypto,
}

impl ProcessorKind {
    /// Capability class handling a payment method.
    pub fn for_method(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::Stripe | PaymentMethod::Square | PaymentMethod::Card => {
                ProcessorKind::Card
            }
            PaymentMethod::Paypal
            | PaymentMethod::Chime
            | PaymentMethod::Cashapp
            | PaymentMethod::Venmo
            | PaymentMethod::Zelle => ProcessorKind::Alternative,
            PaymentMethod::Crypto => ProcessorKind::Crypto,
        }
    }
}

/// Outcome of submitting a charge to a processor.
#[derive(Debug, Clone)]
pub struct PendingCharge {
    /// Gateway-assigned identifier, used to correlate the webhook.
    pub payment_id: String,
    /// True when the processor settled synchronously; otherwise the
    /// charge completes via webhook confirmation.
    pub settled: bool,
}

/// Errors from a payment processor.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("No processor registered for {0:?}")]
    UnsupportedMethod(PaymentMethod),

    #[error("Charge declined: {0}")]
    Declined(String),

    #[error("Gateway error: {0}")]
    Gateway(String),
}

/// Uniform charge interface over an external payment gateway.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    fn kind(&self) -> ProcessorKind;

    /// Submit a charge. Metadata is forwarded opaque to the gateway.
    async fn charge(&self, amount: f64, metadata: Value) -> Result<PendingCharge, PaymentError>;
}

/// Processor registry keyed by capability class.
pub type ProcessorRegistry = HashMap<ProcessorKind, Arc<dyn PaymentProcessor>>;
