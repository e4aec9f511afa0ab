//! Environment-sourced configuration.
//!
//! Everything is read once at startup into an immutable `Config`; business
//! logic receives it by reference and never touches the environment itself.
//! In development the variables come from `.env` (loaded in `main`), in
//! production from the deployment environment.

use anyhow::{Context, Result};

#[derive(Clone, Debug)]
pub struct Config {
    /// Master switch: when off, every webhook call answers "API désactivée".
    pub pin_generation_enabled: bool,

    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_pass: String,

    /// Sender address for every outbound email.
    pub from_email: String,
    /// Front-desk mailbox, notified when the pickup option is selected.
    pub accueil_email: String,
    /// Support mailbox for failure reports.
    pub support_email: String,

    pub igloo_device_id: String,
    pub igloo_client_id: String,
    pub igloo_client_secret: String,

    /// Logflare credentials; the remote log sink is disabled when unset.
    pub logflare_api_key: Option<String>,
    pub logflare_source: Option<String>,

    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let from_email = std::env::var("FROM_EMAIL").context("FROM_EMAIL must be set")?;

        Ok(Config {
            pin_generation_enabled: std::env::var("ENABLE_CODE_PIN_GENERATION")
                .map(|v| v == "1")
                .unwrap_or(false),
            smtp_host: std::env::var("SMTP_HOST").context("SMTP_HOST must be set")?,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(587),
            smtp_user: std::env::var("SMTP_USER").context("SMTP_USER must be set")?,
            smtp_pass: std::env::var("SMTP_PASS").context("SMTP_PASS must be set")?,
            accueil_email: std::env::var("ACCUEIL_EMAIL").unwrap_or_else(|_| from_email.clone()),
            support_email: std::env::var("SUPPORT_EMAIL").unwrap_or_else(|_| from_email.clone()),
            from_email,
            igloo_device_id: std::env::var("IGLOO_DEVICE_ID")
                .context("IGLOO_DEVICE_ID must be set")?,
            igloo_client_id: std::env::var("IGLOO_CLIENT_ID")
                .context("IGLOO_CLIENT_ID must be set")?,
            igloo_client_secret: std::env::var("IGLOO_CLIENT_SECRET")
                .context("IGLOO_CLIENT_SECRET must be set")?,
            logflare_api_key: std::env::var("LOGFLARE_API_KEY").ok(),
            logflare_source: std::env::var("LOGFLARE_SOURCE").ok(),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
        })
    }
}
