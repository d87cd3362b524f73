//! Sweepstakes record: entry bookkeeping and draw results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status. Monotonic: a sweepstakes never moves backwards.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SweepstakesStatus {
    Upcoming,
    Active,
    Ended,
    WinnersAnnounced,
}

impl std::fmt::Display for SweepstakesStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SweepstakesStatus::Upcoming => "upcoming",
            SweepstakesStatus::Active => "active",
            SweepstakesStatus::Ended => "ended",
            SweepstakesStatus::WinnersAnnounced => "winners_announced",
        };
        f.write_str(name)
    }
}

/// How entries are paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryMethod {
    Points,
    Purchase,
    Both,
    Free,
}

/// Cost of a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EntryCost {
    pub points: u64,
    pub amount: f64,
}

/// One prize, drawn in declared order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prize {
    pub name: String,
    pub value: f64,
    pub quantity: u32,
}

/// Cumulative entries for one user. The count only ever increases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub user_id: Uuid,
    pub entry_count: u32,
    pub entry_date: DateTime<Utc>,
}

/// One drawn winner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Winner {
    pub user_id: Uuid,
    pub prize: String,
    pub announced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sweepstakes {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub prizes: Vec<Prize>,
    pub entry_method: EntryMethod,
    pub entry_cost: EntryCost,
    /// One element per distinct entrant.
    pub entries: Vec<Entry>,
    /// Populated exactly once, at the ended -> winners_announced
    /// transition.
    pub winners: Vec<Winner>,
    pub status: SweepstakesStatus,
    /// Whether the maintenance sweep auto-draws winners at close.
    pub is_automatic: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sweepstakes {
    pub fn new(
        title: &str,
        description: &str,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: description.to_string(),
            start_date,
            end_date,
            prizes: Vec::new(),
            entry_method: EntryMethod::Points,
            entry_cost: EntryCost::default(),
            entries: Vec::new(),
            winners: Vec::new(),
            status: status_for_dates(start_date, end_date, now),
            is_automatic: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add `count` entries for a user, creating the entry record on
    /// first entry.
    pub fn add_entry(&mut self, user_id: Uuid, count: u32) {
        match self.entries.iter_mut().find(|e| e.user_id == user_id) {
            Some(entry) => entry.entry_count += count,
            None => self.entries.push(Entry {
                user_id,
                entry_count: count,
                entry_date: Utc::now(),
            }),
        }
    }

    /// Entry count held by a user.
    pub fn entries_for(&self, user_id: Uuid) -> u32 {
        self.entries
            .iter()
            .find(|e| e.user_id == user_id)
            .map_or(0, |e| e.entry_count)
    }

    /// Total entry units across all users (the draw pool size).
    pub fn total_entry_units(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.entry_count)).sum()
    }
}

/// Classify a status from the date window, used at creation.
pub fn status_for_dates(
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> SweepstakesStatus {
    if start_date > now {
        SweepstakesStatus::Upcoming
    } else if end_date < now {
        SweepstakesStatus::Ended
    } else {
        SweepstakesStatus::Active
    }
}
