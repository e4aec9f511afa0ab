//! Igloohome lock API client.
//!
//! Two calls per matched reservation, strictly in sequence and never
//! retried: a client-credentials token exchange, then an hourly-PIN
//! request for the device. No token is cached across webhook calls.
//!
//! The vendor answers a PIN as a 9-digit string; anything else is a hard
//! failure even when the HTTP status is a success.

use serde::Serialize;
use tracing::{debug, error};

use crate::window::AccessWindow;

const TOKEN_URL: &str = "https://auth.igloohome.co/oauth2/token";
const API_BASE: &str = "https://api.igloodeveloper.co/igloohome";

/// The vendor's fuzz parameter for PIN timing, passed through unmodified.
const PIN_VARIANCE: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum IglooError {
    #[error("token endpoint returned HTTP {status}: {body}")]
    Auth {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("PIN endpoint returned HTTP {status}: {body}")]
    Pin {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("unexpected PIN format in vendor response: {0}")]
    BadPinFormat(String),
    #[error("igloohome request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Something that can issue a lock PIN for an access window.
///
/// The webhook handler only depends on this seam, so tests can swap in a
/// fake vendor without touching the network.
pub trait LockVendor: Send + Sync {
    fn issue_pin(
        &self,
        window: &AccessWindow,
        access_name: &str,
    ) -> impl std::future::Future<Output = Result<String, IglooError>> + Send;
}

/// Client for the Igloohome API.
#[derive(Clone)]
pub struct Igloohome {
    http: reqwest::Client,
    device_id: String,
    client_id: String,
    client_secret: String,
}

impl Igloohome {
    pub fn new(device_id: String, client_id: String, client_secret: String) -> Self {
        Igloohome {
            http: reqwest::Client::new(),
            device_id,
            client_id,
            client_secret,
        }
    }

    /// Exchange client credentials for a bearer token.
    pub async fn acquire_token(&self) -> Result<String, IglooError> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!(%status, body = %body, "Igloohome token exchange failed");
            return Err(IglooError::Auth { status, body });
        }

        let token = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("access_token")?.as_str().map(str::to_owned));
        match token {
            Some(t) => {
                debug!("Igloohome token acquired");
                Ok(t)
            }
            None => Err(IglooError::Auth { status, body }),
        }
    }

    /// Request a new hourly PIN for the device over the given window.
    pub async fn create_hourly_pin(
        &self,
        token: &str,
        window: &AccessWindow,
        access_name: &str,
    ) -> Result<String, IglooError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct PinRequest<'a> {
            variance: u32,
            start_date: String,
            end_date: String,
            access_name: &'a str,
        }

        let url = format!("{API_BASE}/devices/{}/algopin/hourly", self.device_id);
        let request = PinRequest {
            variance: PIN_VARIANCE,
            start_date: window.start_str(),
            end_date: window.end_str(),
            access_name,
        };
        debug!(
            device_id = %self.device_id,
            start = %request.start_date,
            end = %request.end_date,
            "Requesting hourly PIN"
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!(%status, body = %body, "Igloohome PIN creation failed");
            return Err(IglooError::Pin { status, body });
        }

        parse_pin_body(&body)
    }
}

impl LockVendor for Igloohome {
    async fn issue_pin(
        &self,
        window: &AccessWindow,
        access_name: &str,
    ) -> Result<String, IglooError> {
        let token = self.acquire_token().await?;
        self.create_hourly_pin(&token, window, access_name).await
    }
}

/// Extract the PIN from a success response body. A success status with
/// anything other than a 9-digit `pin` field is still a hard failure.
fn parse_pin_body(body: &str) -> Result<String, IglooError> {
    let pin = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("pin")?.as_str().map(str::to_owned));
    match pin {
        Some(pin) if is_valid_pin(&pin) => Ok(pin),
        _ => Err(IglooError::BadPinFormat(body.to_string())),
    }
}

/// A valid PIN is exactly 9 ASCII digits.
fn is_valid_pin(pin: &str) -> bool {
    pin.len() == 9 && pin.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nine_digits_is_valid() {
        assert!(is_valid_pin("123456789"));
        assert!(is_valid_pin("000000000"));
    }

    #[test]
    fn anything_else_is_rejected() {
        assert!(!is_valid_pin(""));
        assert!(!is_valid_pin("12345678"));
        assert!(!is_valid_pin("1234567890"));
        assert!(!is_valid_pin("12345678a"));
        assert!(!is_valid_pin("12345 789"));
        assert!(!is_valid_pin("１２３４５６７８９"));
    }

    #[test]
    fn pin_body_with_nine_digits_is_accepted() {
        let pin = parse_pin_body(r#"{"pin":"123456789","pinId":"abc"}"#).unwrap();
        assert_eq!(pin, "123456789");
    }

    #[test]
    fn success_body_with_short_pin_is_a_hard_failure() {
        let err = parse_pin_body(r#"{"pin":"12345"}"#).unwrap_err();
        assert!(matches!(err, IglooError::BadPinFormat(_)), "got {err:?}");
    }

    #[test]
    fn success_body_without_pin_is_a_hard_failure() {
        for body in [r#"{}"#, r#"{"pin":123456789}"#, "not json"] {
            let err = parse_pin_body(body).unwrap_err();
            assert!(matches!(err, IglooError::BadPinFormat(_)), "{body:?} gave {err:?}");
        }
    }
}
