//! User record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tier::{tier_for, Tier};

/// Caller role attached by the auth collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

/// A loyalty program member.
///
/// `tier` is derived from `loyalty_points` and is never set directly by
/// callers; `total_spent` only ever grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// Opaque credential, owned by the auth collaborator.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub loyalty_points: u64,
    pub tier: Tier,
    pub total_spent: f64,
    pub sweepstakes_entries: u64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// New customer with a zeroed ledger. Email is normalized to lowercase.
    pub fn new(email: &str, first_name: &str, last_name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.trim().to_lowercase(),
            password_hash: String::new(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            role: Role::Customer,
            loyalty_points: 0,
            tier: Tier::Bronze,
            total_spent: 0.0,
            sweepstakes_entries: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Recompute the derived tier from the current balance.
    pub fn update_tier(&mut self) {
        self.tier = tier_for(self.loyalty_points);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_normalizes_email() {
        let user = User::new("  Jo.Smith@Example.COM ", "Jo", "Smith");
        assert_eq!(user.email, "jo.smith@example.com");
        assert_eq!(user.tier, Tier::Bronze);
        assert_eq!(user.loyalty_points, 0);
    }

    #[test]
    fn test_update_tier_tracks_balance() {
        let mut user = User::new("a@b.c", "A", "B");
        user.loyalty_points = 2500;
        user.update_tier();
        assert_eq!(user.tier, Tier::Gold);
        user.loyalty_points = 400;
        user.update_tier();
        assert_eq!(user.tier, Tier::Bronze);
    }
}
