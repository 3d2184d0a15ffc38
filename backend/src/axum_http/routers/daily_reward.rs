use crate::{
    auth::AuthUser,
    config::config_model::DotEnvyConfig,
    usecases::daily_reward::{DailyRewardError, DailyRewardUseCase},
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::{FixedOffset, Offset, Utc};
use crates::{
    domain::repositories::credit_ledger::CreditLedgerRepository,
    events::notification_hub::NotificationHub,
    infra::db::{
        postgres::postgres_connection::PgPoolSquad, repositories::credit_ledger::CreditLedgerPostgres,
    },
};
use serde_json::json;
use std::sync::Arc;

fn reference_tz(offset_hours: i32) -> FixedOffset {
    FixedOffset::east_opt(offset_hours * 3600).unwrap_or_else(|| Utc.fix())
}

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    config: Arc<DotEnvyConfig>,
    notification_hub: Arc<NotificationHub>,
) -> Router {
    let ledger_repository = CreditLedgerPostgres::new(Arc::clone(&db_pool));
    let usecase = DailyRewardUseCase::new(
        Arc::new(ledger_repository),
        notification_hub,
        config.reward.daily_amount,
        reference_tz(config.reward.tz_offset_hours),
    );

    Router::new()
        .route("/", get(get_stats).post(grant))
        .with_state(Arc::new(usecase))
}

pub async fn get_stats<L>(
    State(usecase): State<Arc<DailyRewardUseCase<L>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    L: CreditLedgerRepository + Send + Sync + 'static,
{
    match usecase.get_stats(user_id).await {
        Ok(stats) => Json(json!({ "success": true, "stats": stats })).into_response(),
        Err(err) => (
            err.status_code(),
            Json(json!({ "success": false, "message": "Failed to load reward stats" })),
        )
            .into_response(),
    }
}

pub async fn grant<L>(
    State(usecase): State<Arc<DailyRewardUseCase<L>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    L: CreditLedgerRepository + Send + Sync + 'static,
{
    match usecase.grant(user_id).await {
        Ok(granted) => Json(json!({
            "success": true,
            "credits": granted.credits,
            "newBalance": granted.new_balance,
            "message": "Daily reward granted",
        }))
        .into_response(),
        Err(err @ DailyRewardError::AlreadyGranted) => (
            err.status_code(),
            Json(json!({ "success": false, "message": "already granted" })),
        )
            .into_response(),
        Err(err) => (
            err.status_code(),
            Json(json!({ "success": false, "message": "Failed to grant daily reward" })),
        )
            .into_response(),
    }
}
