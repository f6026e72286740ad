use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use labswitch_core::errors::JobRunnerError;
use labswitch_core::jobs::JobRunner;
use labswitch_core::security::{AuthToken, Credentials};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Longest slice of an error body kept in error messages.
const MAX_ERROR_BODY: usize = 200;

/// Connection settings for an AWX / Ansible Tower API.
#[derive(Clone, Debug)]
pub struct AwxConfig {
    /// API base, e.g. `https://awx.example.com/api/v2`.
    pub base_url: String,
    pub credentials: Credentials,
    /// Accept self-signed certificates.
    pub insecure_tls: bool,
    /// Whole-request timeout for every call.
    pub timeout: Duration,
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AuthTokenResponse {
    token: String,
    #[serde(default)]
    expires: Option<String>,
}

/// Job runner client for the AWX REST API.
pub struct AwxClient {
    client: Client,
    config: AwxConfig,
}

impl AwxClient {
    pub fn new(config: AwxConfig) -> Result<Self, JobRunnerError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(config.timeout))
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure_tls)
            .build()
            .map_err(|e| JobRunnerError::Network(format!("failed to build HTTP client: {e}")))?;

        if config.insecure_tls {
            warn!("job runner TLS certificate verification is disabled");
        }

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn transport_error(&self, e: reqwest::Error) -> JobRunnerError {
        if e.is_timeout() {
            JobRunnerError::Timeout(self.config.timeout)
        } else {
            JobRunnerError::Network(e.without_url().to_string())
        }
    }
}

#[async_trait]
impl JobRunner for AwxClient {
    #[instrument(skip(self), fields(user = %self.config.credentials.username))]
    async fn authenticate(&self) -> Result<AuthToken, JobRunnerError> {
        let credentials = &self.config.credentials;
        let body = AuthRequest {
            username: &credentials.username,
            password: credentials.password.expose_secret(),
        };

        let resp = self
            .client
            .post(self.url("authtoken/"))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(JobRunnerError::Auth(format!(
                "status {}: {}",
                status.as_u16(),
                truncate(&body)
            )));
        }

        let token: AuthTokenResponse = resp
            .json()
            .await
            .map_err(|e| JobRunnerError::InvalidResponse(e.without_url().to_string()))?;
        if token.token.is_empty() {
            return Err(JobRunnerError::Auth("empty token in response".into()));
        }

        info!(expires = token.expires.as_deref().unwrap_or("unknown"), "job runner authentication succeeded");
        Ok(AuthToken::new(token.token))
    }

    #[instrument(skip(self, token))]
    async fn launch_job(&self, token: &AuthToken, job_id: &str) -> Result<(), JobRunnerError> {
        let resp = self
            .client
            .post(self.url(&format!("job_templates/{job_id}/launch/")))
            .header("Authorization", format!("Token {}", token.expose()))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(JobRunnerError::Launch {
                job_id: job_id.to_string(),
                detail: format!("status {}: {}", status.as_u16(), truncate(&body)),
            });
        }

        info!(job_id, "job template launch accepted");
        Ok(())
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
