use std::{collections::HashMap, sync::Arc};

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use crates::{
    domain::{
        entities::credit_packages::CreditPackageEntity,
        repositories::{
            credit_ledger::CreditLedgerRepository, credit_packages::CreditPackageRepository,
            payment_provider_customers::PaymentProviderCustomerRepository,
        },
        value_objects::daily_reward::PurchaseCredit,
    },
    events::notification_hub::{NotificationEvent, NotificationHub},
    payments::stripe_client::{StripeClient, StripeCustomer, StripeEvent, StripeSubscription},
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const PROVIDER: &str = "stripe";

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait BillingGateway: Send + Sync {
    async fn create_customer(&self, email: &str, user_id: Uuid) -> AnyResult<String>;

    async fn create_checkout_session(
        &self,
        price_id: &str,
        customer_id: &str,
        metadata: HashMap<String, String>,
    ) -> AnyResult<String>;

    async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> AnyResult<String>;

    async fn get_customer(&self, customer_id: &str) -> AnyResult<StripeCustomer>;

    async fn list_subscriptions(&self, customer_id: &str) -> AnyResult<Vec<StripeSubscription>>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent>;
}

#[async_trait]
impl BillingGateway for StripeClient {
    async fn create_customer(&self, email: &str, user_id: Uuid) -> AnyResult<String> {
        self.create_customer(email, user_id).await
    }

    async fn create_checkout_session(
        &self,
        price_id: &str,
        customer_id: &str,
        metadata: HashMap<String, String>,
    ) -> AnyResult<String> {
        self.create_checkout_session(price_id, customer_id, metadata)
            .await
    }

    async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> AnyResult<String> {
        self.create_billing_portal_session(customer_id, return_url)
            .await
    }

    async fn get_customer(&self, customer_id: &str) -> AnyResult<StripeCustomer> {
        self.get_customer(customer_id).await
    }

    async fn list_subscriptions(&self, customer_id: &str) -> AnyResult<Vec<StripeSubscription>> {
        self.list_subscriptions(customer_id).await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent> {
        self.verify_webhook_signature(payload, signature)
    }
}

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("user email is required")]
    MissingEmail,
    #[error("credit package not found")]
    PackageNotFound,
    #[error("credit package has no configured price")]
    MissingPrice,
    #[error("no billing customer for this user")]
    CustomerNotFound,
    #[error("invalid webhook payload: {0}")]
    InvalidWebhook(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BillingError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            BillingError::MissingEmail
            | BillingError::MissingPrice
            | BillingError::InvalidWebhook(_) => StatusCode::BAD_REQUEST,
            BillingError::PackageNotFound | BillingError::CustomerNotFound => {
                StatusCode::NOT_FOUND
            }
            BillingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, BillingError>;

pub struct BillingUseCase<G, C, P, L>
where
    G: BillingGateway + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    P: CreditPackageRepository + Send + Sync + 'static,
    L: CreditLedgerRepository + Send + Sync + 'static,
{
    billing_gateway: Arc<G>,
    customer_repository: Arc<C>,
    package_repository: Arc<P>,
    ledger_repository: Arc<L>,
    notification_hub: Arc<NotificationHub>,
    billing_portal_return_url: String,
}

impl<G, C, P, L> BillingUseCase<G, C, P, L>
where
    G: BillingGateway + Send + Sync + 'static,
    C: PaymentProviderCustomerRepository + Send + Sync + 'static,
    P: CreditPackageRepository + Send + Sync + 'static,
    L: CreditLedgerRepository + Send + Sync + 'static,
{
    pub fn new(
        billing_gateway: Arc<G>,
        customer_repository: Arc<C>,
        package_repository: Arc<P>,
        ledger_repository: Arc<L>,
        notification_hub: Arc<NotificationHub>,
        billing_portal_return_url: String,
    ) -> Self {
        Self {
            billing_gateway,
            customer_repository,
            package_repository,
            ledger_repository,
            notification_hub,
            billing_portal_return_url,
        }
    }

    pub async fn list_packages(&self) -> UseCaseResult<Vec<CreditPackageEntity>> {
        self.package_repository.list_active().await.map_err(|err| {
            error!(db_error = ?err, "billing: failed to list credit packages");
            BillingError::Internal(err)
        })
    }

    /// Returns the Stripe customer id for the user, provisioning one on
    /// first use.
    pub async fn ensure_customer(
        &self,
        user_id: Uuid,
        email: Option<String>,
    ) -> UseCaseResult<String> {
        if let Some(customer_ref) = self
            .customer_repository
            .find_customer_ref(user_id, PROVIDER)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "billing: failed to load customer ref");
                BillingError::Internal(err)
            })?
        {
            return Ok(customer_ref);
        }

        let email = email.ok_or_else(|| {
            let err = BillingError::MissingEmail;
            warn!(
                %user_id,
                status = err.status_code().as_u16(),
                "billing: cannot provision customer without email"
            );
            err
        })?;

        info!(%user_id, "billing: provisioning stripe customer");
        let customer_ref = self
            .billing_gateway
            .create_customer(&email, user_id)
            .await
            .map_err(|err| {
                error!(%user_id, error = ?err, "billing: stripe customer creation failed");
                BillingError::Internal(err)
            })?;

        self.customer_repository
            .upsert_customer_ref(user_id, PROVIDER, &customer_ref)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    customer_ref,
                    db_error = ?err,
                    "billing: failed to persist customer ref"
                );
                BillingError::Internal(err)
            })?;

        info!(%user_id, customer_ref, "billing: stripe customer provisioned");
        Ok(customer_ref)
    }

    pub async fn create_checkout(
        &self,
        user_id: Uuid,
        email: Option<String>,
        package_id: Uuid,
    ) -> UseCaseResult<String> {
        info!(%user_id, %package_id, "billing: checkout requested");

        let package = self
            .package_repository
            .find_active_by_id(package_id)
            .await
            .map_err(|err| {
                error!(%user_id, %package_id, db_error = ?err, "billing: failed to load package");
                BillingError::Internal(err)
            })?
            .ok_or_else(|| {
                let err = BillingError::PackageNotFound;
                warn!(
                    %user_id,
                    %package_id,
                    status = err.status_code().as_u16(),
                    "billing: unknown or inactive package"
                );
                err
            })?;

        let price_id = package.stripe_price_id.clone().ok_or_else(|| {
            let err = BillingError::MissingPrice;
            warn!(
                %user_id,
                %package_id,
                status = err.status_code().as_u16(),
                "billing: package has no stripe price"
            );
            err
        })?;

        let customer_id = self.ensure_customer(user_id, email).await?;

        let metadata = HashMap::from([
            ("user_id".to_string(), user_id.to_string()),
            ("package_id".to_string(), package_id.to_string()),
            ("credits".to_string(), package.credits.to_string()),
        ]);

        let checkout_url = self
            .billing_gateway
            .create_checkout_session(&price_id, &customer_id, metadata)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %package_id,
                    price_id,
                    customer_id,
                    error = ?err,
                    "billing: stripe checkout session creation failed"
                );
                BillingError::Internal(err)
            })?;

        info!(%user_id, %package_id, "billing: checkout session created");
        Ok(checkout_url)
    }

    pub async fn billing_portal(
        &self,
        user_id: Uuid,
        return_url: Option<&str>,
    ) -> UseCaseResult<String> {
        let customer_id = self.require_customer(user_id).await?;
        let return_url = return_url.unwrap_or(&self.billing_portal_return_url);

        self.billing_gateway
            .create_billing_portal_session(&customer_id, return_url)
            .await
            .map_err(|err| {
                error!(%user_id, customer_id, error = ?err, "billing: portal session failed");
                BillingError::Internal(err)
            })
    }

    pub async fn customer_state(&self, user_id: Uuid) -> UseCaseResult<StripeCustomer> {
        let customer_id = self.require_customer(user_id).await?;

        self.billing_gateway
            .get_customer(&customer_id)
            .await
            .map_err(|err| {
                error!(%user_id, customer_id, error = ?err, "billing: customer fetch failed");
                BillingError::Internal(err)
            })
    }

    pub async fn subscriptions(&self, user_id: Uuid) -> UseCaseResult<Vec<StripeSubscription>> {
        let customer_id = self.require_customer(user_id).await?;

        self.billing_gateway
            .list_subscriptions(&customer_id)
            .await
            .map_err(|err| {
                error!(%user_id, customer_id, error = ?err, "billing: subscription list failed");
                BillingError::Internal(err)
            })
    }

    pub async fn handle_webhook(&self, payload: &[u8], signature: &str) -> UseCaseResult<()> {
        let event = self
            .billing_gateway
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                let mapped = BillingError::InvalidWebhook("signature verification failed".into());
                warn!(
                    error = %err,
                    status = mapped.status_code().as_u16(),
                    "billing: stripe webhook verification failed"
                );
                mapped
            })?;

        info!(event_type = %event.type_, "billing: stripe webhook verified");

        match event.type_.as_str() {
            "checkout.session.completed" => self.handle_checkout_completed(&event).await,
            other => {
                debug!(event_type = other, "billing: ignoring unhandled stripe event");
                Ok(())
            }
        }
    }

    async fn handle_checkout_completed(&self, event: &StripeEvent) -> UseCaseResult<()> {
        let session = StripeClient::extract_checkout_session(event).ok_or_else(|| {
            let err = BillingError::InvalidWebhook("missing checkout session".to_string());
            warn!(
                status = err.status_code().as_u16(),
                "billing: checkout session missing in webhook"
            );
            err
        })?;

        let metadata = session.metadata.clone().unwrap_or_default();
        let user_id = metadata
            .get("user_id")
            .and_then(|value| Uuid::parse_str(value).ok())
            .ok_or_else(|| {
                let err = BillingError::InvalidWebhook("missing user_id".to_string());
                warn!(
                    status = err.status_code().as_u16(),
                    "billing: missing user_id in checkout metadata"
                );
                err
            })?;
        let credits = metadata
            .get("credits")
            .and_then(|value| value.parse::<i32>().ok())
            .filter(|credits| *credits > 0)
            .ok_or_else(|| {
                let err = BillingError::InvalidWebhook("missing credits".to_string());
                warn!(
                    %user_id,
                    status = err.status_code().as_u16(),
                    "billing: missing credits in checkout metadata"
                );
                err
            })?;
        let purchase_ref = session.id.clone().ok_or_else(|| {
            let err = BillingError::InvalidWebhook("missing session id".to_string());
            warn!(
                %user_id,
                status = err.status_code().as_u16(),
                "billing: checkout session has no id"
            );
            err
        })?;

        if let Some(customer) = session.customer.as_deref() {
            if let Err(err) = self
                .customer_repository
                .upsert_customer_ref(user_id, PROVIDER, customer)
                .await
            {
                error!(
                    %user_id,
                    customer_id = customer,
                    db_error = ?err,
                    "billing: failed to upsert customer ref from webhook"
                );
            }
        }

        let notification_payload = json!({
            "type": "purchase",
            "title": "Credits purchased",
            "credits": credits,
            "purchaseRef": purchase_ref,
        });

        let outcome = self
            .ledger_repository
            .credit_purchase(user_id, credits, &purchase_ref, notification_payload)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    purchase_ref,
                    db_error = ?err,
                    "billing: purchase crediting transaction failed"
                );
                BillingError::Internal(err)
            })?;

        match outcome {
            PurchaseCredit::Credited {
                new_balance,
                notification,
                ..
            } => {
                info!(
                    %user_id,
                    purchase_ref,
                    credits,
                    new_balance,
                    "billing: purchase credited"
                );
                self.notification_hub
                    .publish(NotificationEvent::Inserted(notification));
            }
            PurchaseCredit::DuplicateRef => {
                // Retried webhook delivery; the first one already credited.
                info!(%user_id, purchase_ref, "billing: duplicate purchase ref ignored");
            }
        }

        Ok(())
    }

    async fn require_customer(&self, user_id: Uuid) -> UseCaseResult<String> {
        self.customer_repository
            .find_customer_ref(user_id, PROVIDER)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "billing: failed to load customer ref");
                BillingError::Internal(err)
            })?
            .ok_or_else(|| {
                let err = BillingError::CustomerNotFound;
                warn!(
                    %user_id,
                    status = err.status_code().as_u16(),
                    "billing: no provisioned customer for user"
                );
                err
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crates::domain::{
        entities::notifications::NotificationEntity,
        repositories::{
            credit_ledger::MockCreditLedgerRepository,
            credit_packages::MockCreditPackageRepository,
            payment_provider_customers::MockPaymentProviderCustomerRepository,
        },
    };
    use mockall::predicate::eq;

    fn package(stripe_price_id: Option<&str>) -> CreditPackageEntity {
        CreditPackageEntity {
            id: Uuid::new_v4(),
            name: "Starter".to_string(),
            price_minor: 999,
            currency: "usd".to_string(),
            credits: 100,
            stripe_price_id: stripe_price_id.map(str::to_string),
            is_active: true,
            is_popular: false,
            sort_order: 1,
            features: json!(["100 credits"]),
        }
    }

    fn usecase(
        gateway: MockBillingGateway,
        customers: MockPaymentProviderCustomerRepository,
        packages: MockCreditPackageRepository,
        ledger: MockCreditLedgerRepository,
    ) -> BillingUseCase<
        MockBillingGateway,
        MockPaymentProviderCustomerRepository,
        MockCreditPackageRepository,
        MockCreditLedgerRepository,
    > {
        BillingUseCase::new(
            Arc::new(gateway),
            Arc::new(customers),
            Arc::new(packages),
            Arc::new(ledger),
            Arc::new(NotificationHub::new()),
            "https://app.example.com/account".to_string(),
        )
    }

    #[tokio::test]
    async fn checkout_provisions_customer_on_first_use() {
        let user_id = Uuid::new_v4();
        let pkg = package(Some("price_123"));
        let package_id = pkg.id;

        let mut packages = MockCreditPackageRepository::new();
        packages
            .expect_find_active_by_id()
            .with(eq(package_id))
            .returning(move |_| {
                let pkg = pkg.clone();
                Box::pin(async move { Ok(Some(pkg)) })
            });

        let mut customers = MockPaymentProviderCustomerRepository::new();
        customers
            .expect_find_customer_ref()
            .returning(|_, _| Box::pin(async { Ok(None) }));
        customers
            .expect_upsert_customer_ref()
            .withf(|_, provider, customer_ref| provider == "stripe" && customer_ref == "cus_1")
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(()) }));

        let mut gateway = MockBillingGateway::new();
        gateway
            .expect_create_customer()
            .returning(|_, _| Box::pin(async { Ok("cus_1".to_string()) }));
        gateway
            .expect_create_checkout_session()
            .withf(move |price_id, customer_id, metadata| {
                price_id == "price_123"
                    && customer_id == "cus_1"
                    && metadata.get("credits").map(String::as_str) == Some("100")
            })
            .returning(|_, _, _| {
                Box::pin(async { Ok("https://checkout.stripe.com/c/session".to_string()) })
            });

        let usecase = usecase(gateway, customers, packages, MockCreditLedgerRepository::new());
        let url = usecase
            .create_checkout(user_id, Some("user@example.com".to_string()), package_id)
            .await
            .expect("checkout succeeds");
        assert!(url.starts_with("https://checkout.stripe.com/"));
    }

    #[tokio::test]
    async fn checkout_without_email_or_customer_is_rejected() {
        let pkg = package(Some("price_123"));
        let package_id = pkg.id;

        let mut packages = MockCreditPackageRepository::new();
        packages.expect_find_active_by_id().returning(move |_| {
            let pkg = pkg.clone();
            Box::pin(async move { Ok(Some(pkg)) })
        });
        let mut customers = MockPaymentProviderCustomerRepository::new();
        customers
            .expect_find_customer_ref()
            .returning(|_, _| Box::pin(async { Ok(None) }));

        let usecase = usecase(
            MockBillingGateway::new(),
            customers,
            packages,
            MockCreditLedgerRepository::new(),
        );
        let result = usecase.create_checkout(Uuid::new_v4(), None, package_id).await;
        assert!(matches!(result, Err(BillingError::MissingEmail)));
    }

    #[tokio::test]
    async fn portal_without_customer_mapping_is_not_found() {
        let mut customers = MockPaymentProviderCustomerRepository::new();
        customers
            .expect_find_customer_ref()
            .returning(|_, _| Box::pin(async { Ok(None) }));

        let usecase = usecase(
            MockBillingGateway::new(),
            customers,
            MockCreditPackageRepository::new(),
            MockCreditLedgerRepository::new(),
        );
        let result = usecase.billing_portal(Uuid::new_v4(), None).await;
        assert!(matches!(result, Err(BillingError::CustomerNotFound)));
    }

    fn completed_checkout_event(user_id: Uuid, credits: i32, session_id: &str) -> StripeEvent {
        serde_json::from_value(json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": session_id,
                    "mode": "payment",
                    "customer": "cus_1",
                    "metadata": {
                        "user_id": user_id.to_string(),
                        "credits": credits.to_string(),
                    }
                }
            }
        }))
        .expect("valid event json")
    }

    #[tokio::test]
    async fn completed_checkout_credits_purchase_once() {
        let user_id = Uuid::new_v4();

        let mut gateway = MockBillingGateway::new();
        gateway
            .expect_verify_webhook_signature()
            .returning(move |_, _| Ok(completed_checkout_event(user_id, 100, "cs_1")));

        let mut customers = MockPaymentProviderCustomerRepository::new();
        customers
            .expect_upsert_customer_ref()
            .returning(|_, _, _| Box::pin(async { Ok(()) }));

        let mut ledger = MockCreditLedgerRepository::new();
        ledger
            .expect_credit_purchase()
            .withf(move |uid, credits, purchase_ref, _| {
                *uid == user_id && *credits == 100 && purchase_ref == "cs_1"
            })
            .times(1)
            .returning(|uid, _, _, payload| {
                Box::pin(async move {
                    Ok(PurchaseCredit::Credited {
                        ledger_entry_id: Uuid::new_v4(),
                        new_balance: 100,
                        notification: NotificationEntity {
                            id: Uuid::new_v4(),
                            user_id: uid,
                            payload,
                            is_read: false,
                            created_at: Utc::now(),
                            updated_at: Utc::now(),
                        },
                    })
                })
            });

        let usecase = usecase(gateway, customers, MockCreditPackageRepository::new(), ledger);
        usecase
            .handle_webhook(b"{}", "sig")
            .await
            .expect("webhook handled");
    }

    #[tokio::test]
    async fn duplicate_purchase_ref_is_an_idempotent_no_op() {
        let user_id = Uuid::new_v4();

        let mut gateway = MockBillingGateway::new();
        gateway
            .expect_verify_webhook_signature()
            .returning(move |_, _| Ok(completed_checkout_event(user_id, 100, "cs_1")));

        let mut customers = MockPaymentProviderCustomerRepository::new();
        customers
            .expect_upsert_customer_ref()
            .returning(|_, _, _| Box::pin(async { Ok(()) }));

        let mut ledger = MockCreditLedgerRepository::new();
        ledger
            .expect_credit_purchase()
            .returning(|_, _, _, _| Box::pin(async { Ok(PurchaseCredit::DuplicateRef) }));

        let usecase = usecase(gateway, customers, MockCreditPackageRepository::new(), ledger);
        let result = usecase.handle_webhook(b"{}", "sig").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn invalid_signature_is_a_bad_request() {
        let mut gateway = MockBillingGateway::new();
        gateway
            .expect_verify_webhook_signature()
            .returning(|_, _| Err(anyhow::anyhow!("bad signature")));

        let usecase = usecase(
            gateway,
            MockPaymentProviderCustomerRepository::new(),
            MockCreditPackageRepository::new(),
            MockCreditLedgerRepository::new(),
        );
        let result = usecase.handle_webhook(b"{}", "sig").await;

        match result {
            Err(err) => assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST),
            Ok(_) => panic!("expected an error"),
        }
    }
}
