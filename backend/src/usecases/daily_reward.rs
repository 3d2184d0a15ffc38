use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, Utc};
use crates::{
    domain::{
        repositories::credit_ledger::CreditLedgerRepository,
        value_objects::daily_reward::{DailyRewardStats, GrantAttempt},
    },
    events::notification_hub::{NotificationEvent, NotificationHub},
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// How many grant dates to pull when computing the streak. Bounds the query
/// and caps the reported streak length.
const STREAK_WINDOW: i64 = 60;

#[derive(Debug, Error)]
pub enum DailyRewardError {
    #[error("already granted")]
    AlreadyGranted,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl DailyRewardError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            DailyRewardError::AlreadyGranted => StatusCode::BAD_REQUEST,
            DailyRewardError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, DailyRewardError>;

#[derive(Debug, Clone, Copy)]
pub struct GrantedReward {
    pub credits: i32,
    pub new_balance: i64,
}

pub struct DailyRewardUseCase<L>
where
    L: CreditLedgerRepository + Send + Sync + 'static,
{
    ledger_repository: Arc<L>,
    notification_hub: Arc<NotificationHub>,
    reward_amount: i32,
    reference_tz: FixedOffset,
}

impl<L> DailyRewardUseCase<L>
where
    L: CreditLedgerRepository + Send + Sync + 'static,
{
    pub fn new(
        ledger_repository: Arc<L>,
        notification_hub: Arc<NotificationHub>,
        reward_amount: i32,
        reference_tz: FixedOffset,
    ) -> Self {
        Self {
            ledger_repository,
            notification_hub,
            reward_amount,
            reference_tz,
        }
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.reference_tz).date_naive()
    }

    pub async fn get_stats(&self, user_id: Uuid) -> UseCaseResult<DailyRewardStats> {
        let current_balance = self.ledger_repository.balance(user_id).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "daily_reward: failed to compute balance");
            DailyRewardError::Internal(err)
        })?;

        let last_granted_at = self
            .ledger_repository
            .last_daily_reward_at(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "daily_reward: failed to load last grant");
                DailyRewardError::Internal(err)
            })?;

        let grant_dates = self
            .ledger_repository
            .recent_grant_dates(user_id, STREAK_WINDOW)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "daily_reward: failed to load grant dates");
                DailyRewardError::Internal(err)
            })?;

        let today = self.today();
        let can_claim_today = grant_dates.first() != Some(&today);
        let streak_length = streak_length(&grant_dates, today);

        Ok(DailyRewardStats {
            can_claim_today,
            current_balance,
            last_granted_at,
            streak_length,
        })
    }

    pub async fn grant(&self, user_id: Uuid) -> UseCaseResult<GrantedReward> {
        let today = self.today();
        info!(%user_id, grant_date = %today, "daily_reward: grant requested");

        let payload = json!({
            "type": "daily_reward",
            "title": "Daily login reward",
            "credits": self.reward_amount,
            "grantDate": today,
        });

        let attempt = self
            .ledger_repository
            .grant_daily_reward(user_id, today, self.reward_amount, payload)
            .await
            .map_err(|err| {
                error!(%user_id, grant_date = %today, db_error = ?err, "daily_reward: grant transaction failed");
                DailyRewardError::Internal(err)
            })?;

        match attempt {
            GrantAttempt::Granted {
                credits,
                new_balance,
                notification,
            } => {
                info!(
                    %user_id,
                    grant_date = %today,
                    credits,
                    new_balance,
                    "daily_reward: reward granted"
                );
                self.notification_hub
                    .publish(NotificationEvent::Inserted(notification));
                Ok(GrantedReward {
                    credits,
                    new_balance,
                })
            }
            GrantAttempt::AlreadyGranted => {
                let err = DailyRewardError::AlreadyGranted;
                warn!(
                    %user_id,
                    grant_date = %today,
                    status = err.status_code().as_u16(),
                    "daily_reward: reward already granted today"
                );
                Err(err)
            }
        }
    }
}

/// Consecutive grant days ending at the most recent grant. Counts only when
/// that grant is today or yesterday; an older latest grant means the streak
/// is broken.
fn streak_length(grant_dates: &[NaiveDate], today: NaiveDate) -> u32 {
    let Some(&latest) = grant_dates.first() else {
        return 0;
    };
    let Some(yesterday) = today.pred_opt() else {
        return 0;
    };
    if latest != today && latest != yesterday {
        return 0;
    }

    let mut streak = 1u32;
    let mut expected = latest;
    for &date in &grant_dates[1..] {
        expected = match expected.pred_opt() {
            Some(previous) => previous,
            None => break,
        };
        if date == expected {
            streak += 1;
        } else {
            break;
        }
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use crates::domain::entities::notifications::NotificationEntity;
    use crates::domain::repositories::credit_ledger::MockCreditLedgerRepository;
    use mockall::predicate::eq;

    fn utc_offset() -> FixedOffset {
        use chrono::Offset;
        Utc.fix()
    }

    fn usecase_with(
        mock: MockCreditLedgerRepository,
    ) -> DailyRewardUseCase<MockCreditLedgerRepository> {
        DailyRewardUseCase::new(Arc::new(mock), Arc::new(NotificationHub::new()), 5, utc_offset())
    }

    fn granted_attempt(user_id: Uuid, credits: i32, new_balance: i64) -> GrantAttempt {
        GrantAttempt::Granted {
            credits,
            new_balance,
            notification: NotificationEntity {
                id: Uuid::new_v4(),
                user_id,
                payload: json!({"type": "daily_reward", "credits": credits}),
                is_read: false,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn second_same_day_grant_is_rejected_and_balance_moves_once() {
        let user_id = Uuid::new_v4();
        let mut mock = MockCreditLedgerRepository::new();
        let mut call = 0;
        mock.expect_grant_daily_reward()
            .times(2)
            .returning(move |uid, _, amount, _| {
                call += 1;
                let first = call == 1;
                Box::pin(async move {
                    if first {
                        Ok(granted_attempt(uid, amount, amount as i64))
                    } else {
                        Ok(GrantAttempt::AlreadyGranted)
                    }
                })
            });

        let usecase = usecase_with(mock);

        let granted = usecase.grant(user_id).await.expect("first grant succeeds");
        assert_eq!(granted.credits, 5);
        assert_eq!(granted.new_balance, 5);

        let second = usecase.grant(user_id).await;
        assert!(matches!(second, Err(DailyRewardError::AlreadyGranted)));
    }

    #[tokio::test]
    async fn granted_reward_is_published_to_subscribers() {
        let user_id = Uuid::new_v4();
        let mut mock = MockCreditLedgerRepository::new();
        mock.expect_grant_daily_reward()
            .returning(|uid, _, amount, _| {
                Box::pin(async move { Ok(granted_attempt(uid, amount, amount as i64)) })
            });

        let hub = Arc::new(NotificationHub::new());
        let mut receiver = hub.subscribe(user_id);
        let usecase =
            DailyRewardUseCase::new(Arc::new(mock), Arc::clone(&hub), 5, utc_offset());

        usecase.grant(user_id).await.expect("grant succeeds");

        let event = receiver.recv().await.expect("event should be published");
        assert!(matches!(event, NotificationEvent::Inserted(_)));
    }

    #[tokio::test]
    async fn stats_reflect_ledger_sum_and_claimability() {
        let user_id = Uuid::new_v4();
        let today = Utc::now().date_naive();
        let last_grant: DateTime<Utc> = Utc::now();

        let mut mock = MockCreditLedgerRepository::new();
        mock.expect_balance()
            .with(eq(user_id))
            .returning(|_| Box::pin(async { Ok(42) }));
        mock.expect_last_daily_reward_at()
            .with(eq(user_id))
            .returning(move |_| Box::pin(async move { Ok(Some(last_grant)) }));
        mock.expect_recent_grant_dates()
            .returning(move |_, _| Box::pin(async move { Ok(vec![today]) }));

        let usecase = usecase_with(mock);
        let stats = usecase.get_stats(user_id).await.expect("stats load");

        assert_eq!(stats.current_balance, 42);
        assert!(!stats.can_claim_today);
        assert_eq!(stats.streak_length, 1);
    }

    #[tokio::test]
    async fn unknown_user_maps_to_default_stats() {
        let user_id = Uuid::new_v4();
        let mut mock = MockCreditLedgerRepository::new();
        mock.expect_balance().returning(|_| Box::pin(async { Ok(0) }));
        mock.expect_last_daily_reward_at()
            .returning(|_| Box::pin(async { Ok(None) }));
        mock.expect_recent_grant_dates()
            .returning(|_, _| Box::pin(async { Ok(Vec::new()) }));

        let usecase = usecase_with(mock);
        let stats = usecase.get_stats(user_id).await.expect("stats load");

        assert!(stats.can_claim_today);
        assert_eq!(stats.current_balance, 0);
        assert_eq!(stats.last_granted_at, None);
        assert_eq!(stats.streak_length, 0);
    }

    #[test]
    fn streak_counts_consecutive_days_ending_today_or_yesterday() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let d = |day: u32| NaiveDate::from_ymd_opt(2026, 8, day).unwrap();

        assert_eq!(streak_length(&[], today), 0);
        assert_eq!(streak_length(&[d(24)], today), 1);
        assert_eq!(streak_length(&[d(24), d(23), d(22)], today), 3);
        assert_eq!(streak_length(&[d(23), d(22)], today), 2);
        // Gap breaks the run.
        assert_eq!(streak_length(&[d(24), d(22), d(21)], today), 1);
        // Latest grant too old, streak is over.
        assert_eq!(streak_length(&[d(20), d(19)], today), 0);
    }

    #[test]
    fn streak_is_capped_by_the_query_window() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let dates: Vec<NaiveDate> = (0..STREAK_WINDOW)
            .map_while(|offset| today.checked_sub_days(chrono::Days::new(offset as u64)))
            .collect();

        // A run longer than the window still reports at most the window size.
        assert_eq!(dates.len() as i64, STREAK_WINDOW);
        assert_eq!(streak_length(&dates, today), STREAK_WINDOW as u32);
    }
}
