//! Sweepstakes engine: entry bookkeeping and the weighted winner draw.
//!
//! The draw builds a pool with one unit per entry a user holds and
//! removes only the drawn unit, so win probability is proportional to
//! entry count and a user holding several units can win more than one
//! prize. Winner selection commits against the sweepstakes version read
//! at the start of the draw; a concurrent entry invalidates the draw
//! and it re-runs against fresh state.

use std::sync::Arc;

use backon::Retryable;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::required;
use crate::error::{LoyaltyError, Result};
use crate::interfaces::ledger_store::{LedgerStore, Versioned, WriteOp};
use crate::records::{
    Entry, EntryCost, EntryMethod, LedgerTransaction, Prize, Role, Sweepstakes,
    SweepstakesStatus, TransactionKind, TransactionStatus, Winner,
};
use crate::utils::retry::{conflict_backoff, is_retryable};

/// Result of entering a sweepstakes.
#[derive(Debug, Clone, Serialize)]
pub struct EntryOutcome {
    pub entries_added: u32,
    pub total_entries_for_user: u32,
    pub remaining_points: u64,
}

/// Admin payload for creating a sweepstakes.
#[derive(Debug, Clone)]
pub struct NewSweepstakes {
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub prizes: Vec<Prize>,
    pub entry_method: EntryMethod,
    pub entry_cost: EntryCost,
    pub is_automatic: bool,
}

/// Admin payload for editing a sweepstakes. Status may only move
/// forward through the lifecycle.
#[derive(Debug, Clone, Default)]
pub struct SweepstakesPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub prizes: Option<Vec<Prize>>,
    pub entry_method: Option<EntryMethod>,
    pub entry_cost: Option<EntryCost>,
    pub is_automatic: Option<bool>,
    pub status: Option<SweepstakesStatus>,
}

/// A sweepstakes as presented to one viewer. Non-admin viewers do not
/// see the raw entry list, only the entrant count and their own entry.
#[derive(Debug, Clone, Serialize)]
pub struct SweepstakesView {
    pub sweepstakes: Sweepstakes,
    pub total_entrants: usize,
    pub user_entry: Option<Entry>,
}

/// Draw winners from a weighted pool: one unit per entry held, each
/// prize drawn `quantity` times uniformly without replacement. Drawing
/// stops early if the pool empties.
pub fn draw_winners<R: Rng>(
    entries: &[Entry],
    prizes: &[Prize],
    announced_at: DateTime<Utc>,
    rng: &mut R,
) -> Vec<Winner> {
    let mut pool: Vec<Uuid> = Vec::new();
    for entry in entries {
        for _ in 0..entry.entry_count {
            pool.push(entry.user_id);
        }
    }

    let mut winners = Vec::new();
    for prize in prizes {
        for _ in 0..prize.quantity {
            if pool.is_empty() {
                break;
            }
            let index = rng.random_range(0..pool.len());
            let user_id = pool.swap_remove(index);
            winners.push(Winner {
                user_id,
                prize: prize.name.clone(),
                announced_at,
            });
        }
    }
    winners
}

/// Sweepstakes engine.
#[derive(Clone)]
pub struct SweepstakesService {
    store: Arc<dyn LedgerStore>,
}

impl SweepstakesService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Buy `entry_count` entries into an active sweepstakes.
    ///
    /// Points are debited only for `points`/`both` entry methods; when
    /// any points are spent, one audit transaction records the entry.
    pub async fn enter(
        &self,
        user_id: Uuid,
        sweepstakes_id: Uuid,
        entry_count: u32,
    ) -> Result<EntryOutcome> {
        if entry_count == 0 {
            return Err(LoyaltyError::Validation(
                "entry count must be positive".into(),
            ));
        }

        (|| self.try_enter(user_id, sweepstakes_id, entry_count))
            .retry(conflict_backoff())
            .when(is_retryable)
            .await
    }

    async fn try_enter(
        &self,
        user_id: Uuid,
        sweepstakes_id: Uuid,
        entry_count: u32,
    ) -> Result<EntryOutcome> {
        let Versioned {
            record: mut user,
            version: user_version,
        } = required(self.store.get_user(user_id).await, "user")?;
        let Versioned {
            record: mut sweepstakes,
            version: sweepstakes_version,
        } = required(
            self.store.get_sweepstakes(sweepstakes_id).await,
            "sweepstakes",
        )?;

        if sweepstakes.status != SweepstakesStatus::Active {
            return Err(LoyaltyError::NotActive);
        }

        let points_cost = sweepstakes.entry_cost.points * u64::from(entry_count);
        let mut points_spent = 0;
        if matches!(
            sweepstakes.entry_method,
            EntryMethod::Points | EntryMethod::Both
        ) {
            if user.loyalty_points < points_cost {
                return Err(LoyaltyError::InsufficientPoints {
                    required: points_cost,
                    available: user.loyalty_points,
                });
            }
            user.loyalty_points -= points_cost;
            user.update_tier();
            points_spent = points_cost;
        }

        let now = Utc::now();
        sweepstakes.add_entry(user_id, entry_count);
        sweepstakes.updated_at = now;
        user.sweepstakes_entries += u64::from(entry_count);
        user.updated_at = now;

        let total_entries_for_user = sweepstakes.entries_for(user_id);
        let remaining_points = user.loyalty_points;

        let mut ops = vec![
            WriteOp::PutUser {
                user,
                expected_version: user_version,
            },
            WriteOp::PutSweepstakes {
                sweepstakes: sweepstakes.clone(),
                expected_version: sweepstakes_version,
            },
        ];

        if points_spent > 0 {
            let transaction = LedgerTransaction::new(
                user_id,
                TransactionKind::SweepstakesEntry,
                sweepstakes.entry_cost.amount * f64::from(entry_count),
            )
            .with_points_spent(points_spent)
            .with_status(TransactionStatus::Completed)
            .with_description(format!(
                "Entered: {} ({} entries)",
                sweepstakes.title, entry_count
            ))
            .with_metadata(json!({ "sweepstakes_id": sweepstakes.id }));
            ops.push(WriteOp::InsertTransaction { transaction });
        }

        self.store.commit(ops).await?;

        Ok(EntryOutcome {
            entries_added: entry_count,
            total_entries_for_user,
            remaining_points,
        })
    }

    /// Draw winners for every prize and announce them.
    ///
    /// Terminal: a sweepstakes whose winners are announced rejects any
    /// further draw.
    pub async fn select_winners(&self, sweepstakes_id: Uuid) -> Result<Vec<Winner>> {
        (|| self.try_select_winners(sweepstakes_id))
            .retry(conflict_backoff())
            .when(is_retryable)
            .await
    }

    async fn try_select_winners(&self, sweepstakes_id: Uuid) -> Result<Vec<Winner>> {
        let Versioned {
            record: mut sweepstakes,
            version,
        } = required(
            self.store.get_sweepstakes(sweepstakes_id).await,
            "sweepstakes",
        )?;

        if sweepstakes.status == SweepstakesStatus::WinnersAnnounced {
            return Err(LoyaltyError::AlreadyAnnounced);
        }

        let announced_at = Utc::now();
        let winners = {
            let mut rng = rand::rng();
            draw_winners(
                &sweepstakes.entries,
                &sweepstakes.prizes,
                announced_at,
                &mut rng,
            )
        };

        sweepstakes.winners = winners.clone();
        sweepstakes.status = SweepstakesStatus::WinnersAnnounced;
        sweepstakes.updated_at = announced_at;

        self.store
            .commit(vec![WriteOp::PutSweepstakes {
                sweepstakes,
                expected_version: version,
            }])
            .await?;

        info!(
            sweepstakes = %sweepstakes_id,
            winners = winners.len(),
            "Winners announced"
        );
        Ok(winners)
    }

    /// Sweepstakes with the given status (or all), newest first.
    pub async fn list(&self, status: Option<SweepstakesStatus>) -> Result<Vec<Sweepstakes>> {
        Ok(self.store.list_sweepstakes(status).await?)
    }

    /// One sweepstakes as seen by a viewer.
    pub async fn view(
        &self,
        sweepstakes_id: Uuid,
        viewer: Uuid,
        role: Role,
    ) -> Result<SweepstakesView> {
        let mut sweepstakes = required(
            self.store.get_sweepstakes(sweepstakes_id).await,
            "sweepstakes",
        )?
        .record;

        let total_entrants = sweepstakes.entries.len();
        let user_entry = sweepstakes
            .entries
            .iter()
            .find(|e| e.user_id == viewer)
            .cloned();

        if role != Role::Admin {
            sweepstakes.entries.clear();
        }

        Ok(SweepstakesView {
            sweepstakes,
            total_entrants,
            user_entry,
        })
    }

    /// Admin: create a sweepstakes. Status is classified from the date
    /// window at creation time.
    pub async fn create(&self, new: NewSweepstakes) -> Result<Sweepstakes> {
        if new.title.trim().is_empty() {
            return Err(LoyaltyError::Validation(
                "sweepstakes title is required".into(),
            ));
        }
        if new.end_date <= new.start_date {
            return Err(LoyaltyError::Validation(
                "end date must be after start date".into(),
            ));
        }

        let mut sweepstakes = Sweepstakes::new(
            &new.title,
            &new.description,
            new.start_date,
            new.end_date,
        );
        sweepstakes.prizes = new.prizes;
        sweepstakes.entry_method = new.entry_method;
        sweepstakes.entry_cost = new.entry_cost;
        sweepstakes.is_automatic = new.is_automatic;

        self.store.insert_sweepstakes(sweepstakes.clone()).await?;
        Ok(sweepstakes)
    }

    /// Admin: edit a sweepstakes. The lifecycle status never regresses.
    pub async fn update(
        &self,
        sweepstakes_id: Uuid,
        patch: SweepstakesPatch,
    ) -> Result<Sweepstakes> {
        (|| self.try_update(sweepstakes_id, &patch))
            .retry(conflict_backoff())
            .when(is_retryable)
            .await
    }

    async fn try_update(
        &self,
        sweepstakes_id: Uuid,
        patch: &SweepstakesPatch,
    ) -> Result<Sweepstakes> {
        let Versioned {
            record: mut sweepstakes,
            version,
        } = required(
            self.store.get_sweepstakes(sweepstakes_id).await,
            "sweepstakes",
        )?;

        if let Some(status) = patch.status {
            if status < sweepstakes.status {
                return Err(LoyaltyError::Validation(format!(
                    "status cannot move backwards: {} -> {}",
                    sweepstakes.status, status
                )));
            }
            sweepstakes.status = status;
        }
        if let Some(title) = &patch.title {
            sweepstakes.title = title.clone();
        }
        if let Some(description) = &patch.description {
            sweepstakes.description = description.clone();
        }
        if let Some(start_date) = patch.start_date {
            sweepstakes.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            sweepstakes.end_date = end_date;
        }
        if let Some(prizes) = &patch.prizes {
            sweepstakes.prizes = prizes.clone();
        }
        if let Some(entry_method) = patch.entry_method {
            sweepstakes.entry_method = entry_method;
        }
        if let Some(entry_cost) = patch.entry_cost {
            sweepstakes.entry_cost = entry_cost;
        }
        if let Some(is_automatic) = patch.is_automatic {
            sweepstakes.is_automatic = is_automatic;
        }
        sweepstakes.updated_at = Utc::now();

        self.store
            .commit(vec![WriteOp::PutSweepstakes {
                sweepstakes: sweepstakes.clone(),
                expected_version: version,
            }])
            .await?;

        Ok(sweepstakes)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn entry(user_id: Uuid, count: u32) -> Entry {
        Entry {
            user_id,
            entry_count: count,
            entry_date: Utc::now(),
        }
    }

    fn prize(name: &str, quantity: u32) -> Prize {
        Prize {
            name: name.to_string(),
            value: 100.0,
            quantity,
        }
    }

    #[test]
    fn test_draw_empty_pool() {
        let mut rng = StdRng::seed_from_u64(1);
        let winners = draw_winners(&[], &[prize("Trip", 3)], Utc::now(), &mut rng);
        assert!(winners.is_empty());
    }

    #[test]
    fn test_draw_stops_when_pool_exhausted() {
        let mut rng = StdRng::seed_from_u64(2);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let entries = [entry(a, 2), entry(b, 1)];
        let prizes = [prize("First", 2), prize("Second", 5)];

        let winners = draw_winners(&entries, &prizes, Utc::now(), &mut rng);
        // 3 units total: 2 for the first prize, 1 left for the second.
        assert_eq!(winners.len(), 3);
        assert_eq!(winners.iter().filter(|w| w.prize == "First").count(), 2);
        assert_eq!(winners.iter().filter(|w| w.prize == "Second").count(), 1);
    }

    #[test]
    fn test_draw_respects_prize_order_and_quantity() {
        let mut rng = StdRng::seed_from_u64(3);
        let entries: Vec<Entry> = (0..10).map(|_| entry(Uuid::new_v4(), 1)).collect();
        let prizes = [prize("Grand", 1), prize("Runner-up", 3)];

        let winners = draw_winners(&entries, &prizes, Utc::now(), &mut rng);
        assert_eq!(winners.len(), 4);
        assert_eq!(winners[0].prize, "Grand");
        assert!(winners[1..].iter().all(|w| w.prize == "Runner-up"));
    }

    #[test]
    fn test_draw_removes_only_the_drawn_unit() {
        // A user holding every unit must win every prize.
        let mut rng = StdRng::seed_from_u64(4);
        let a = Uuid::new_v4();
        let entries = [entry(a, 5)];
        let prizes = [prize("First", 1), prize("Second", 1)];

        let winners = draw_winners(&entries, &prizes, Utc::now(), &mut rng);
        assert_eq!(winners.len(), 2);
        assert!(winners.iter().all(|w| w.user_id == a));
    }

    #[test]
    fn test_draw_never_exceeds_pool_units() {
        let mut rng = StdRng::seed_from_u64(5);
        let entries = [entry(Uuid::new_v4(), 3), entry(Uuid::new_v4(), 2)];
        let prizes = [prize("P1", 4), prize("P2", 4)];

        let winners = draw_winners(&entries, &prizes, Utc::now(), &mut rng);
        assert_eq!(winners.len(), 5, "winners must not exceed pool units");
    }

    #[test]
    fn test_draw_weighting_is_proportional() {
        // User A holds 3 of 4 units; over many draws A should win the
        // single prize about 75% of the time.
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let entries = [entry(a, 3), entry(b, 1)];
        let prizes = [prize("Only", 1)];

        let mut rng = StdRng::seed_from_u64(6);
        let trials = 4_000;
        let mut a_wins = 0;
        for _ in 0..trials {
            let winners = draw_winners(&entries, &prizes, Utc::now(), &mut rng);
            if winners[0].user_id == a {
                a_wins += 1;
            }
        }

        let share = f64::from(a_wins) / f64::from(trials);
        assert!(
            (0.70..0.80).contains(&share),
            "expected ~0.75 win share for A, got {share}"
        );
    }
}
