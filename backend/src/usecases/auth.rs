use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::Utc;
use crates::{
    domain::{entities::users::UpsertUserEntity, repositories::users::UserRepository},
    identity::supabase_auth::{AuthSession, IdentityUser, SupabaseAuthClient},
};
use thiserror::Error;
use tracing::{error, info, warn};

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait AuthGateway: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> AnyResult<IdentityUser>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AnyResult<AuthSession>;

    async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> AnyResult<AuthSession>;

    async fn sign_out(&self, access_token: &str) -> AnyResult<()>;
}

#[async_trait]
impl AuthGateway for SupabaseAuthClient {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> AnyResult<IdentityUser> {
        self.sign_up(email, password, display_name).await
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AnyResult<AuthSession> {
        self.sign_in_with_password(email, password).await
    }

    async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> AnyResult<AuthSession> {
        self.exchange_code(auth_code, code_verifier).await
    }

    async fn sign_out(&self, access_token: &str) -> AnyResult<()> {
        self.sign_out(access_token).await
    }
}

#[derive(Debug, Error)]
pub enum AuthFlowError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("sign-up rejected")]
    SignUpRejected,
    #[error("code exchange failed")]
    CodeExchangeFailed,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthFlowError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            AuthFlowError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthFlowError::SignUpRejected | AuthFlowError::CodeExchangeFailed => {
                StatusCode::BAD_REQUEST
            }
            AuthFlowError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, AuthFlowError>;

pub struct AuthUseCase<G, U>
where
    G: AuthGateway + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    auth_gateway: Arc<G>,
    user_repository: Arc<U>,
}

impl<G, U> AuthUseCase<G, U>
where
    G: AuthGateway + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    pub fn new(auth_gateway: Arc<G>, user_repository: Arc<U>) -> Self {
        Self {
            auth_gateway,
            user_repository,
        }
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> UseCaseResult<IdentityUser> {
        info!(email, "auth: sign-up requested");
        let user = self
            .auth_gateway
            .sign_up(email, password, display_name)
            .await
            .map_err(|err| {
                let mapped = AuthFlowError::SignUpRejected;
                warn!(
                    email,
                    error = ?err,
                    status = mapped.status_code().as_u16(),
                    "auth: sign-up rejected by identity provider"
                );
                mapped
            })?;

        info!(email, user_id = %user.id, "auth: sign-up accepted");
        Ok(user)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> UseCaseResult<AuthSession> {
        info!(email, "auth: password sign-in requested");
        let session = self
            .auth_gateway
            .sign_in_with_password(email, password)
            .await
            .map_err(|err| {
                let mapped = AuthFlowError::InvalidCredentials;
                warn!(
                    email,
                    error = ?err,
                    status = mapped.status_code().as_u16(),
                    "auth: password sign-in failed"
                );
                mapped
            })?;

        self.record_sign_in(&session.user).await;
        Ok(session)
    }

    pub async fn sign_in_with_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> UseCaseResult<AuthSession> {
        info!("auth: code exchange requested");
        let session = self
            .auth_gateway
            .exchange_code(auth_code, code_verifier)
            .await
            .map_err(|err| {
                let mapped = AuthFlowError::CodeExchangeFailed;
                warn!(
                    error = ?err,
                    status = mapped.status_code().as_u16(),
                    "auth: code exchange failed"
                );
                mapped
            })?;

        self.record_sign_in(&session.user).await;
        Ok(session)
    }

    pub async fn sign_out(&self, access_token: &str) -> UseCaseResult<()> {
        self.auth_gateway.sign_out(access_token).await.map_err(|err| {
            error!(error = ?err, "auth: sign-out failed at identity provider");
            AuthFlowError::Internal(err)
        })
    }

    /// Mirrors the identity into `app_users`. Failure here must never block
    /// the login, so it is logged and swallowed.
    async fn record_sign_in(&self, user: &IdentityUser) {
        let now = Utc::now();
        let display_name = user
            .user_metadata
            .get("display_name")
            .and_then(|value| value.as_str())
            .map(|value| value.to_string());
        let preferred_locale = user
            .user_metadata
            .get("preferred_locale")
            .and_then(|value| value.as_str())
            .unwrap_or("en")
            .to_string();

        let entity = UpsertUserEntity {
            id: user.id,
            display_name,
            preferred_locale,
            last_login_at: now,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.user_repository.upsert_on_sign_in(entity).await {
            error!(
                user_id = %user.id,
                db_error = ?err,
                "auth: failed to upsert local user after sign-in"
            );
        } else {
            info!(user_id = %user.id, "auth: local user upserted after sign-in");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crates::domain::repositories::users::MockUserRepository;
    use serde_json::json;
    use uuid::Uuid;

    fn session_for(user_id: Uuid) -> AuthSession {
        AuthSession {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_in: Some(3600),
            user: IdentityUser {
                id: user_id,
                email: Some("user@example.com".to_string()),
                user_metadata: json!({"display_name": "User"}),
            },
        }
    }

    #[tokio::test]
    async fn sign_in_upserts_local_user() {
        let user_id = Uuid::new_v4();
        let mut gateway = MockAuthGateway::new();
        gateway
            .expect_sign_in_with_password()
            .returning(move |_, _| Box::pin(async move { Ok(session_for(user_id)) }));

        let mut users = MockUserRepository::new();
        users
            .expect_upsert_on_sign_in()
            .withf(move |entity| {
                entity.id == user_id && entity.display_name.as_deref() == Some("User")
            })
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let usecase = AuthUseCase::new(Arc::new(gateway), Arc::new(users));
        let session = usecase
            .sign_in("user@example.com", "hunter2")
            .await
            .expect("sign-in succeeds");
        assert_eq!(session.user.id, user_id);
    }

    #[tokio::test]
    async fn upsert_failure_does_not_block_sign_in() {
        let user_id = Uuid::new_v4();
        let mut gateway = MockAuthGateway::new();
        gateway
            .expect_sign_in_with_password()
            .returning(move |_, _| Box::pin(async move { Ok(session_for(user_id)) }));

        let mut users = MockUserRepository::new();
        users
            .expect_upsert_on_sign_in()
            .returning(|_| Box::pin(async { Err(anyhow::anyhow!("db down")) }));

        let usecase = AuthUseCase::new(Arc::new(gateway), Arc::new(users));
        let result = usecase.sign_in("user@example.com", "hunter2").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn bad_credentials_map_to_unauthorized() {
        let mut gateway = MockAuthGateway::new();
        gateway
            .expect_sign_in_with_password()
            .returning(|_, _| Box::pin(async { Err(anyhow::anyhow!("invalid grant")) }));
        let users = MockUserRepository::new();

        let usecase = AuthUseCase::new(Arc::new(gateway), Arc::new(users));
        let result = usecase.sign_in("user@example.com", "wrong").await;

        match result {
            Err(err) => assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED),
            Ok(_) => panic!("expected an error"),
        }
    }
}
