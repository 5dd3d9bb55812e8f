//! Bearer token exchange.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::{DocumentError, TokenProvider};
use crate::config::ServicesConfig;

/// Body the token service returns with HTTP 200 when the user is unknown.
const UNKNOWN_USER_BODY: &str = "{No se pudo obtener el nombre de usuario}";

/// Fetches a fresh token from the token service on every call.
pub struct HttpTokenProvider {
    client: Client,
    url: String,
    user: String,
    password: String,
}

impl HttpTokenProvider {
    pub fn new(config: &ServicesConfig) -> Result<Self, DocumentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocumentError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            url: config.token_url.clone(),
            user: config.token_user.clone(),
            password: config.token_password.clone(),
        })
    }
}

#[async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn token(&self) -> Result<String, DocumentError> {
        debug!(url = %self.url, "Requesting bearer token");
        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        interpret_token_response(status, body)
    }
}

fn interpret_token_response(status: StatusCode, body: String) -> Result<String, DocumentError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(DocumentError::Unauthorized(format!(
            "token service returned {}",
            status
        )));
    }
    if !status.is_success() {
        return Err(DocumentError::Http {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        });
    }

    let token = body.trim();
    if token == UNKNOWN_USER_BODY {
        return Err(DocumentError::Unauthorized(
            "token service did not recognise the user".to_string(),
        ));
    }
    if token.is_empty() {
        return Err(DocumentError::InvalidResponse(
            "token service returned an empty body".to_string(),
        ));
    }
    Ok(token.to_string())
}
