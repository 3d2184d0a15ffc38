use crate::{
    auth::AuthUser,
    config::config_model::DotEnvyConfig,
    usecases::billing::{BillingError, BillingGateway, BillingUseCase},
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use crates::{
    domain::repositories::{
        credit_ledger::CreditLedgerRepository, credit_packages::CreditPackageRepository,
        payment_provider_customers::PaymentProviderCustomerRepository,
    },
    events::notification_hub::NotificationHub,
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            credit_ledger::CreditLedgerPostgres, credit_packages::CreditPackagePostgres,
            payment_provider_customers::PaymentProviderCustomerPostgres,
        },
    },
    payments::stripe_client::StripeClient,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    package_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalBody {
    return_url: Option<String>,
}

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    config: Arc<DotEnvyConfig>,
    notification_hub: Arc<NotificationHub>,
) -> Router {
    let billing_gateway = StripeClient::new(
        config.stripe.secret_key.clone(),
        config.stripe.webhook_secret.clone(),
        config.stripe.success_url.clone(),
        config.stripe.cancel_url.clone(),
    );
    let customer_repository = PaymentProviderCustomerPostgres::new(Arc::clone(&db_pool));
    let package_repository = CreditPackagePostgres::new(Arc::clone(&db_pool));
    let ledger_repository = CreditLedgerPostgres::new(Arc::clone(&db_pool));
    let usecase = BillingUseCase::new(
        Arc::new(billing_gateway),
        Arc::new(customer_repository),
        Arc::new(package_repository),
        Arc::new(ledger_repository),
        notification_hub,
        config.stripe.billing_portal_return_url.clone(),
    );

    Router::new()
        .route("/api/credit-packages", get(list_packages))
        .route("/api/stripe/customer", post(create_customer).get(customer_state))
        .route("/api/stripe/checkout", post(create_checkout))
        .route("/api/stripe/billing-portal", post(billing_portal))
        .route("/api/stripe/subscriptions", get(subscriptions))
        .route("/api/stripe/webhook", post(webhook))
        .with_state(Arc::new(usecase))
}

pub async fn list_packages<G, C, P, L>(
    State(usecase): State<Arc<BillingUseCase<G, C, P, L>>>,
    _user: AuthUser,
) -> impl IntoResponse
where
    G: BillingGateway + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    P: CreditPackageRepository + Send + Sync + 'static,
    L: CreditLedgerRepository + Send + Sync + 'static,
{
    match usecase.list_packages().await {
        Ok(packages) => Json(packages).into_response(),
        Err(err) => billing_error_response(err),
    }
}

pub async fn create_customer<G, C, P, L>(
    State(usecase): State<Arc<BillingUseCase<G, C, P, L>>>,
    AuthUser { user_id, email, .. }: AuthUser,
) -> impl IntoResponse
where
    G: BillingGateway + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    P: CreditPackageRepository + Send + Sync + 'static,
    L: CreditLedgerRepository + Send + Sync + 'static,
{
    match usecase.ensure_customer(user_id, email).await {
        Ok(customer_id) => Json(json!({ "customerId": customer_id })).into_response(),
        Err(err) => billing_error_response(err),
    }
}

pub async fn customer_state<G, C, P, L>(
    State(usecase): State<Arc<BillingUseCase<G, C, P, L>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    G: BillingGateway + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    P: CreditPackageRepository + Send + Sync + 'static,
    L: CreditLedgerRepository + Send + Sync + 'static,
{
    match usecase.customer_state(user_id).await {
        Ok(customer) => Json(customer).into_response(),
        Err(err) => billing_error_response(err),
    }
}

pub async fn create_checkout<G, C, P, L>(
    State(usecase): State<Arc<BillingUseCase<G, C, P, L>>>,
    AuthUser { user_id, email, .. }: AuthUser,
    Json(body): Json<CheckoutBody>,
) -> impl IntoResponse
where
    G: BillingGateway + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    P: CreditPackageRepository + Send + Sync + 'static,
    L: CreditLedgerRepository + Send + Sync + 'static,
{
    let package_id = match body.package_id.as_deref().map(Uuid::parse_str) {
        Some(Ok(package_id)) => package_id,
        Some(Err(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                "packageId must be a valid UUID".to_string(),
            )
                .into_response();
        }
        None => {
            return (StatusCode::BAD_REQUEST, "packageId is required".to_string())
                .into_response();
        }
    };

    match usecase.create_checkout(user_id, email, package_id).await {
        Ok(url) => Json(json!({ "url": url })).into_response(),
        Err(err) => billing_error_response(err),
    }
}

pub async fn billing_portal<G, C, P, L>(
    State(usecase): State<Arc<BillingUseCase<G, C, P, L>>>,
    AuthUser { user_id, .. }: AuthUser,
    body: Option<Json<PortalBody>>,
) -> impl IntoResponse
where
    G: BillingGateway + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    P: CreditPackageRepository + Send + Sync + 'static,
    L: CreditLedgerRepository + Send + Sync + 'static,
{
    let return_url = body.and_then(|Json(body)| body.return_url);

    match usecase.billing_portal(user_id, return_url.as_deref()).await {
        Ok(url) => Json(json!({ "url": url })).into_response(),
        Err(err) => billing_error_response(err),
    }
}

pub async fn subscriptions<G, C, P, L>(
    State(usecase): State<Arc<BillingUseCase<G, C, P, L>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    G: BillingGateway + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    P: CreditPackageRepository + Send + Sync + 'static,
    L: CreditLedgerRepository + Send + Sync + 'static,
{
    match usecase.subscriptions(user_id).await {
        Ok(subscriptions) => Json(subscriptions).into_response(),
        Err(err) => billing_error_response(err),
    }
}

/// Stripe calls this endpoint directly, so it authenticates with the
/// signature header instead of a user token.
pub async fn webhook<G, C, P, L>(
    State(usecase): State<Arc<BillingUseCase<G, C, P, L>>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse
where
    G: BillingGateway + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    P: CreditPackageRepository + Send + Sync + 'static,
    L: CreditLedgerRepository + Send + Sync + 'static,
{
    let Some(signature) = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
    else {
        return (
            StatusCode::BAD_REQUEST,
            "stripe-signature header is required".to_string(),
        )
            .into_response();
    };

    match usecase.handle_webhook(&body, signature).await {
        Ok(()) => Json(json!({ "received": true })).into_response(),
        Err(err) => billing_error_response(err),
    }
}

fn billing_error_response(err: BillingError) -> axum::response::Response {
    let status = err.status_code();
    let message = match &err {
        BillingError::Internal(_) => {
            error!(error = ?err, "billing router: request failed");
            "Internal server error".to_string()
        }
        _ => err.to_string(),
    };

    (status, Json(json!({ "code": status.as_u16(), "message": message }))).into_response()
}
