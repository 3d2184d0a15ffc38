use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::entities::notifications::NotificationEntity;

/// Read-side view of a user's reward state. Unknown users map to
/// `DailyRewardStats::default()` rather than an error.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRewardStats {
    pub can_claim_today: bool,
    pub current_balance: i64,
    pub last_granted_at: Option<DateTime<Utc>>,
    /// Consecutive grant days ending today or yesterday. Computed from a
    /// bounded window of recent grants, so streaks longer than that window
    /// are reported as the window size.
    pub streak_length: u32,
}

impl Default for DailyRewardStats {
    fn default() -> Self {
        Self {
            can_claim_today: true,
            current_balance: 0,
            last_granted_at: None,
            streak_length: 0,
        }
    }
}

/// Outcome of a grant transaction. `AlreadyGranted` covers both the
/// read-before-write check and a lost race on the (user_id, grant_date)
/// constraint.
#[derive(Debug)]
pub enum GrantAttempt {
    Granted {
        credits: i32,
        new_balance: i64,
        notification: NotificationEntity,
    },
    AlreadyGranted,
}

/// Outcome of crediting a purchase from a gateway webhook. Retried webhook
/// deliveries land on `DuplicateRef`.
#[derive(Debug)]
pub enum PurchaseCredit {
    Credited {
        ledger_entry_id: uuid::Uuid,
        new_balance: i64,
        notification: NotificationEntity,
    },
    DuplicateRef,
}
