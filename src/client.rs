//! HTTP client for the remote card reorder API.
//!
//! This is the only network boundary in the crate. The engine treats it as a
//! collaborator: success settles the triggering control, failure carries a
//! human-readable message that the engine surfaces to the user. No
//! client-side deadline is applied; failure is only ever an explicit
//! unsuccessful response.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;

use crate::config::Credentials;

/// Target position for a card reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Top,
    Bottom,
}

impl Position {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Bottom => "bottom",
        }
    }
}

/// Reorder request errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unauthorized: check the configured credentials")]
    Unauthorized,

    #[error("reorder API error {status}: {body}")]
    Api { status: StatusCode, body: String },
}

/// The boundary the engine's move-to-top/bottom controls call.
#[async_trait]
pub trait ReorderClient: Send + Sync {
    /// Move `card_id` to the given position within its column.
    async fn move_card(
        &self,
        credentials: &Credentials,
        card_id: &str,
        position: Position,
    ) -> Result<(), ClientError>;
}

/// reqwest-backed reorder client with basic authentication.
#[derive(Debug, Clone)]
pub struct HttpReorderClient {
    base_url: String,
    client: Client,
}

impl HttpReorderClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ReorderClient for HttpReorderClient {
    async fn move_card(
        &self,
        credentials: &Credentials,
        card_id: &str,
        position: Position,
    ) -> Result<(), ClientError> {
        let url = format!("{}/cards/{}/moves", self.base_url, card_id);
        let response = self
            .client
            .post(&url)
            .basic_auth(&credentials.identity, Some(&credentials.secret))
            .json(&serde_json::json!({ "position": position }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            match status {
                StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
                _ => Err(ClientError::Api { status, body }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Position::Top).unwrap(), "\"top\"");
        assert_eq!(
            serde_json::to_string(&Position::Bottom).unwrap(),
            "\"bottom\""
        );
    }
}
