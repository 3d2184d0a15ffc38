use anyhow::Result;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

/// Client for the Supabase Auth (GoTrue) REST API.
/// https://supabase.com/docs/reference/auth
pub struct SupabaseAuthClient {
    http: reqwest::Client,
    auth_base_url: String,
    anon_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityUser {
    pub id: Uuid,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: Option<i64>,
    pub user: IdentityUser,
}

#[derive(Debug, Deserialize)]
struct GoTrueErrorEnvelope {
    error: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    error_code: Option<String>,
}

impl SupabaseAuthClient {
    pub fn new(project_url: &str, anon_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            auth_base_url: format!("{}/auth/v1", project_url.trim_end_matches('/')),
            anon_key,
        }
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let (gotrue_error, gotrue_error_code, gotrue_message) =
            match serde_json::from_str::<GoTrueErrorEnvelope>(&body) {
                Ok(envelope) => (
                    envelope.error,
                    envelope.error_code,
                    envelope.error_description.or(envelope.msg),
                ),
                Err(_) => (None, None, None),
            };

        error!(
            status = %status,
            gotrue_error = ?gotrue_error,
            gotrue_error_code = ?gotrue_error_code,
            gotrue_message = ?gotrue_message,
            response_body = %body,
            context = %context,
            "supabase auth request failed"
        );

        anyhow::bail!(
            "Supabase Auth request failed: {} (status {})",
            context,
            status
        );
    }

    /// Registers a new user. When email confirmation is enabled the session
    /// tokens are absent until the user confirms.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<IdentityUser> {
        let mut body = json!({ "email": email, "password": password });
        if let Some(display_name) = display_name {
            body["data"] = json!({ "display_name": display_name });
        }

        let resp = self
            .http
            .post(format!("{}/signup", self.auth_base_url))
            .header("apikey", &self.anon_key)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "sign up").await?;

        #[derive(Deserialize)]
        struct SignUpResp {
            id: Option<Uuid>,
            email: Option<String>,
            #[serde(default)]
            user_metadata: serde_json::Value,
            user: Option<IdentityUser>,
        }

        // GoTrue returns the bare user when confirmation is pending and a
        // session envelope when autoconfirm is on.
        let parsed: SignUpResp = resp.json().await?;
        if let Some(user) = parsed.user {
            return Ok(user);
        }

        let id = parsed
            .id
            .ok_or_else(|| anyhow::anyhow!("sign-up response is missing the user id"))?;

        Ok(IdentityUser {
            id,
            email: parsed.email,
            user_metadata: parsed.user_metadata,
        })
    }

    /// Password grant. Returns the full session on success.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        let resp = self
            .http
            .post(format!("{}/token?grant_type=password", self.auth_base_url))
            .header("apikey", &self.anon_key)
            .header(CONTENT_TYPE, "application/json")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "sign in with password").await?;

        let session: AuthSession = resp.json().await?;
        Ok(session)
    }

    /// Exchanges a PKCE authorization code from the OAuth/magic-link callback
    /// for a session.
    pub async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> Result<AuthSession> {
        let resp = self
            .http
            .post(format!("{}/token?grant_type=pkce", self.auth_base_url))
            .header("apikey", &self.anon_key)
            .header(CONTENT_TYPE, "application/json")
            .json(&json!({ "auth_code": auth_code, "code_verifier": code_verifier }))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "exchange auth code").await?;

        let session: AuthSession = resp.json().await?;
        Ok(session)
    }

    /// Revokes the session behind the given access token.
    pub async fn sign_out(&self, access_token: &str) -> Result<()> {
        let resp = self
            .http
            .post(format!("{}/logout", self.auth_base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        Self::ensure_success(resp, "sign out").await?;

        Ok(())
    }
}
