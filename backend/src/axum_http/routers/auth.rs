use crate::{
    auth::AuthUser,
    config::config_model::DotEnvyConfig,
    usecases::auth::{AuthFlowError, AuthGateway, AuthUseCase},
};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use crates::{
    domain::repositories::users::UserRepository,
    identity::supabase_auth::SupabaseAuthClient,
    infra::db::{postgres::postgres_connection::PgPoolSquad, repositories::users::UserPostgres},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";
const REFRESH_TOKEN_COOKIE: &str = "sb-refresh-token";
const CODE_VERIFIER_COOKIE: &str = "sb-code-verifier";

#[derive(Debug, Deserialize)]
pub struct SignInBody {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignUpBody {
    email: Option<String>,
    password: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    redirect: Option<String>,
}

pub fn routes(db_pool: Arc<PgPoolSquad>, config: Arc<DotEnvyConfig>) -> Router {
    let auth_gateway = SupabaseAuthClient::new(
        &config.supabase.project_url,
        config.supabase.anon_key.clone(),
    );
    let user_repository = UserPostgres::new(Arc::clone(&db_pool));
    let usecase = AuthUseCase::new(Arc::new(auth_gateway), Arc::new(user_repository));

    Router::new()
        .route("/api/auth/sign-in", post(sign_in))
        .route("/api/auth/sign-up", post(sign_up))
        .route("/api/auth/sign-out", post(sign_out))
        .route("/auth/callback", get(callback))
        .with_state(Arc::new(usecase))
}

pub async fn sign_in<G, U>(
    State(usecase): State<Arc<AuthUseCase<G, U>>>,
    jar: CookieJar,
    Json(body): Json<SignInBody>,
) -> impl IntoResponse
where
    G: AuthGateway + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    let (Some(email), Some(password)) = (body.email, body.password) else {
        return (
            StatusCode::BAD_REQUEST,
            "email and password are required".to_string(),
        )
            .into_response();
    };

    match usecase.sign_in(&email, &password).await {
        Ok(session) => {
            let jar = jar
                .add(session_cookie(ACCESS_TOKEN_COOKIE, &session.access_token))
                .add(session_cookie(REFRESH_TOKEN_COOKIE, &session.refresh_token));
            (
                jar,
                Json(json!({
                    "success": true,
                    "user": session.user,
                    "session": {
                        "accessToken": session.access_token,
                        "refreshToken": session.refresh_token,
                        "expiresIn": session.expires_in,
                    },
                })),
            )
                .into_response()
        }
        Err(err) => auth_error_response(err),
    }
}

pub async fn sign_up<G, U>(
    State(usecase): State<Arc<AuthUseCase<G, U>>>,
    Json(body): Json<SignUpBody>,
) -> impl IntoResponse
where
    G: AuthGateway + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    let (Some(email), Some(password)) = (body.email, body.password) else {
        return (
            StatusCode::BAD_REQUEST,
            "email and password are required".to_string(),
        )
            .into_response();
    };

    match usecase.sign_up(&email, &password, body.name.as_deref()).await {
        Ok(user) => Json(json!({
            "success": true,
            "message": "Check your inbox to confirm the account",
            "user": user,
        }))
        .into_response(),
        Err(err) => auth_error_response(err),
    }
}

pub async fn sign_out<G, U>(
    State(usecase): State<Arc<AuthUseCase<G, U>>>,
    AuthUser { user_id, .. }: AuthUser,
    headers: HeaderMap,
    jar: CookieJar,
) -> impl IntoResponse
where
    G: AuthGateway + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    let Some(token) = crate::auth::extract_bearer_token(&headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    if let Err(err) = usecase.sign_out(&token).await {
        // The local session cookies are cleared either way.
        error!(%user_id, error = ?err, "auth router: provider sign-out failed");
    }

    let jar = jar
        .remove(Cookie::from(ACCESS_TOKEN_COOKIE))
        .remove(Cookie::from(REFRESH_TOKEN_COOKIE));
    (jar, Json(json!({ "success": true }))).into_response()
}

pub async fn callback<G, U>(
    State(usecase): State<Arc<AuthUseCase<G, U>>>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> impl IntoResponse
where
    G: AuthGateway + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    let Some(code) = query.code else {
        return Redirect::temporary("/auth/sign-in?error=auth").into_response();
    };
    let Some(verifier) = jar
        .get(CODE_VERIFIER_COOKIE)
        .map(|cookie| cookie.value().to_string())
    else {
        return Redirect::temporary("/auth/sign-in?error=auth").into_response();
    };

    match usecase.sign_in_with_code(&code, &verifier).await {
        Ok(session) => {
            let target = query
                .redirect
                .filter(|target| target.starts_with('/') && !target.starts_with("//"))
                .unwrap_or_else(|| "/generate".to_string());
            let jar = jar
                .add(session_cookie(ACCESS_TOKEN_COOKIE, &session.access_token))
                .add(session_cookie(REFRESH_TOKEN_COOKIE, &session.refresh_token))
                .remove(Cookie::from(CODE_VERIFIER_COOKIE));
            (jar, Redirect::temporary(&target)).into_response()
        }
        Err(err) => {
            error!(error = ?err, "auth router: callback code exchange failed");
            Redirect::temporary("/auth/sign-in?error=auth").into_response()
        }
    }
}

fn session_cookie(name: &'static str, value: &str) -> Cookie<'static> {
    Cookie::build((name, value.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn auth_error_response(err: AuthFlowError) -> axum::response::Response {
    let status = err.status_code();
    let message = match &err {
        AuthFlowError::Internal(_) => {
            error!(error = ?err, "auth router: request failed");
            "Internal server error".to_string()
        }
        _ => err.to_string(),
    };

    (
        status,
        Json(json!({ "success": false, "message": message })),
    )
        .into_response()
}
