//! Best-effort structured events to Logflare.
//!
//! One event per successfully processed rental. Failures are logged and
//! swallowed; the webhook outcome never depends on the log sink.

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;

const LOGFLARE_URL: &str = "https://api.logflare.app/logs/json";

#[derive(Serialize)]
struct LogEntry<'a> {
    level: &'a str,
    message: &'a str,
    metadata: serde_json::Value,
}

#[derive(Clone)]
pub struct LogSink {
    http: reqwest::Client,
    /// `(api_key, source)`; sink is disabled when unset.
    credentials: Option<(String, String)>,
}

impl LogSink {
    pub fn new(config: &Config) -> Self {
        let credentials = config
            .logflare_api_key
            .clone()
            .zip(config.logflare_source.clone());
        if credentials.is_none() {
            warn!("Logflare credentials missing, remote log sink disabled");
        }
        LogSink {
            http: reqwest::Client::new(),
            credentials,
        }
    }

    #[cfg(test)]
    pub fn disabled() -> Self {
        LogSink {
            http: reqwest::Client::new(),
            credentials: None,
        }
    }

    /// Record that a PIN was generated and mailed out.
    pub async fn pin_issued(&self, email: &str, reservation: &str, rackets: u32, pin: &str) {
        self.send(
            "info",
            "Code PIN généré et e-mail envoyé",
            serde_json::json!({
                "email": email,
                "reservation": reservation,
                "rackets": rackets,
                "pin": pin,
            }),
        )
        .await;
    }

    async fn send(&self, level: &str, message: &str, metadata: serde_json::Value) {
        let Some((api_key, source)) = &self.credentials else {
            return;
        };

        let entry = LogEntry {
            level,
            message,
            metadata,
        };
        let result = self
            .http
            .post(LOGFLARE_URL)
            .query(&[("source", source.as_str())])
            .header("X-API-KEY", api_key)
            .json(&[entry])
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(message, "Logflare event sent");
            }
            Ok(response) => {
                warn!(status = %response.status(), "Logflare request failed");
            }
            Err(e) => {
                warn!(error = %e, "Logflare request failed");
            }
        }
    }
}
