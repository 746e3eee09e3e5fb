//! Authentication-related models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "user_id must not be empty"))]
    pub user_id: String,
    #[validate(length(min = 1, message = "pwd must not be empty"))]
    pub pwd: String,
}

/// Token issuance / renewal response: `{ token, refreshToken? }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub token: String,
    #[serde(rename = "refreshToken", default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Token refresh request: `{ refreshToken }`
#[derive(Debug, Serialize)]
pub struct RefreshTokenRequest<'a> {
    #[serde(rename = "refreshToken")]
    pub refresh_token: &'a str,
}

/// Stored identity record, used for display only
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    pub user_id: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logged_in_at: Option<DateTime<Utc>>,
    /// Anything else the backend attaches to the user record
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: role.into(),
            logged_in_at: None,
            extra: serde_json::Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_optional_refresh() {
        let resp: TokenResponse = serde_json::from_str(r#"{"token":"A2"}"#).unwrap();
        assert_eq!(resp.token, "A2");
        assert!(resp.refresh_token.is_none());

        let resp: TokenResponse =
            serde_json::from_str(r#"{"token":"A","refreshToken":"R"}"#).unwrap();
        assert_eq!(resp.refresh_token.as_deref(), Some("R"));
    }

    #[test]
    fn test_refresh_request_wire_name() {
        let body = serde_json::to_value(RefreshTokenRequest { refresh_token: "R" }).unwrap();
        assert_eq!(body, serde_json::json!({ "refreshToken": "R" }));
    }

    #[test]
    fn test_login_request_rejects_empty_fields() {
        let req = LoginRequest {
            user_id: String::new(),
            pwd: "p".to_string(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_identity_keeps_unknown_fields() {
        let identity: Identity =
            serde_json::from_str(r#"{"user_id":"u1","role":"admin","team":"ops"}"#).unwrap();
        assert_eq!(identity.extra.get("team"), Some(&serde_json::json!("ops")));
    }
}
