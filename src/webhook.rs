//! Webhook receiver for HelloAsso payment notifications.
//!
//! HelloAsso retries any delivery that doesn't come back as HTTP 200, so
//! every outcome — including failures — answers 200 with the outcome
//! encoded in the JSON body. Retrying is the provider's job, never ours.
//!
//! Stage order: classify → compute window → issue PIN → notify. Each stage
//! can short-circuit to a no-op or error-reported outcome without invoking
//! the later ones.

use axum::{extract::State, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::email::{
    front_desk_body, invalid_reservation_body, pin_body, support_missing_email_body,
    support_pin_failure_body, Notifier, SUBJECT_FRONT_DESK, SUBJECT_INVALID_RESERVATION,
    SUBJECT_PIN, SUBJECT_SUPPORT_MISSING_EMAIL, SUBJECT_SUPPORT_PIN_FAILURE,
};
use crate::helloasso::{classify, Item, Notification, FIELD_DAY, FIELD_TIME};
use crate::igloo::LockVendor;
use crate::logsink::LogSink;
use crate::window::{compute_window, AccessWindow, WindowError};
use crate::AppState;

/// Outcome of one webhook delivery. Always mapped to HTTP 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Feature flag is off.
    Disabled,
    /// Unmatched form or item — the expected majority case.
    Ignored,
    /// Matched item but no payer email in the payload.
    MissingEmail,
    /// Reservation invalid or the lock vendor refused; support was notified.
    PinFailure,
    /// PIN issued and mailed to the payer.
    Sent,
    /// Unexpected error; detail only in server-side logs.
    Internal,
}

impl Reply {
    pub fn body(self) -> Value {
        match self {
            Reply::Disabled => json!({ "message": "API désactivée" }),
            Reply::Ignored => json!({ "ignored": true }),
            Reply::MissingEmail => json!({ "message": "Email manquant" }),
            Reply::PinFailure => json!({
                "status": "error",
                "message": "Erreur lors de la génération du code PIN",
            }),
            Reply::Sent => json!({ "sent": true }),
            Reply::Internal => json!({ "error": "Internal Server Error" }),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/helloasso", post(handle_helloasso))
}

async fn handle_helloasso(State(state): State<AppState>, Json(raw): Json<Value>) -> Json<Value> {
    let reply = process_notification(
        &state.config,
        &state.igloo,
        &state.mailer,
        &state.logsink,
        &raw,
    )
    .await
    .unwrap_or_else(|err| {
        error!("Unexpected error handling HelloAsso notification: {err:#}");
        Reply::Internal
    });
    Json(reply.body())
}

/// Run the full pipeline for one notification.
///
/// `Ok(reply)` covers every expected outcome, including reported failures;
/// `Err` is reserved for the unexpected (mail delivery included, per the
/// always-200 contract the caller maps it to [`Reply::Internal`]).
pub async fn process_notification<V, N>(
    config: &Config,
    vendor: &V,
    notifier: &N,
    logsink: &LogSink,
    raw: &Value,
) -> anyhow::Result<Reply>
where
    V: LockVendor,
    N: Notifier,
{
    if !config.pin_generation_enabled {
        return Ok(Reply::Disabled);
    }

    // Kept verbatim for support emails and logs.
    let payload_json = serde_json::to_string_pretty(raw)?;

    let notification: Notification = match serde_json::from_value(raw.clone()) {
        Ok(n) => n,
        Err(e) => {
            info!(error = %e, payload = %payload_json, "Notification non exploitable, ignorée");
            return Ok(Reply::Ignored);
        }
    };
    let Some(data) = notification.data else {
        info!(payload = %payload_json, "Notification ignorée (aucune donnée)");
        return Ok(Reply::Ignored);
    };
    let Some(rental) = classify(&data) else {
        info!(payload = %payload_json, "Notification ignorée (formulaire ou article non géré)");
        return Ok(Reply::Ignored);
    };
    info!(payload = %payload_json, "Notification à traiter");

    let Some(email) = data.payer.as_ref().and_then(|p| p.email.as_deref()) else {
        error!("Aucune adresse e-mail trouvée dans le payload");
        notifier
            .send(
                &config.support_email,
                SUBJECT_SUPPORT_MISSING_EMAIL,
                &support_missing_email_body(&payload_json),
            )
            .await?;
        return Ok(Reply::MissingEmail);
    };

    // Human-readable reservation label, used in every email.
    let reservation = format!(
        "{} à {}",
        rental.item.custom_field(FIELD_DAY).unwrap_or("?"),
        rental.item.custom_field(FIELD_TIME).unwrap_or("?"),
    );

    let window = match reservation_window(rental.item, Utc::now()) {
        Ok(w) => w,
        Err(err) => {
            warn!(error = %err, reservation = %reservation, "Réservation invalide");
            if let Err(e) = notifier
                .send(
                    email,
                    SUBJECT_INVALID_RESERVATION,
                    &invalid_reservation_body(&reservation),
                )
                .await
            {
                error!(error = %e, "Failed to notify payer of invalid reservation");
            }
            notify_support_pin_failure(config, notifier, &err.to_string(), &payload_json).await;
            return Ok(Reply::PinFailure);
        }
    };

    let pin = match vendor.issue_pin(&window, email).await {
        Ok(pin) => pin,
        Err(err) => {
            error!(error = %err, "Échec de la génération du code PIN");
            notify_support_pin_failure(config, notifier, &err.to_string(), &payload_json).await;
            return Ok(Reply::PinFailure);
        }
    };
    info!(email, pin = %pin, "Code PIN généré");

    let item_name = rental
        .item
        .name
        .as_deref()
        .unwrap_or("Location de raquettes de padel");
    notifier
        .send(
            email,
            SUBJECT_PIN,
            &pin_body(item_name, &pin, &reservation, rental.variant),
        )
        .await?;

    if rental.front_desk_pickup {
        info!("Option accueil demandée, envoi d'un e-mail à l'accueil");
        notifier
            .send(
                &config.accueil_email,
                SUBJECT_FRONT_DESK,
                &front_desk_body(email, &reservation, rental.variant),
            )
            .await?;
    }

    logsink
        .pin_issued(email, &reservation, rental.variant.count(), &pin)
        .await;

    Ok(Reply::Sent)
}

/// Pull the required custom fields off the matched item and derive the
/// access window. A missing field is an invalid reservation, same as an
/// unparseable or stale one.
fn reservation_window(item: &Item, now: DateTime<Utc>) -> Result<AccessWindow, WindowError> {
    let day = item
        .custom_field(FIELD_DAY)
        .ok_or(WindowError::MissingField(FIELD_DAY))?;
    let time = item
        .custom_field(FIELD_TIME)
        .ok_or(WindowError::MissingField(FIELD_TIME))?;
    compute_window(day, time, now)
}

/// Best-effort failure report to the support mailbox.
async fn notify_support_pin_failure<N: Notifier>(
    config: &Config,
    notifier: &N,
    error_detail: &str,
    payload_json: &str,
) {
    if let Err(e) = notifier
        .send(
            &config.support_email,
            SUBJECT_SUPPORT_PIN_FAILURE,
            &support_pin_failure_body(error_detail, payload_json),
        )
        .await
    {
        error!(error = %e, "Failed to notify support of PIN failure");
    }
}
