//! Outbound email.
//!
//! Every user-facing and support-facing message goes through one SMTP
//! `Mailer`. Message bodies are plain text, in French, and live here as
//! template functions so the handler only deals with recipients.

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{error, info};

use crate::config::Config;
use crate::helloasso::RacketVariant;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid recipient address {0:?}")]
    BadAddress(String),
    #[error("failed to build email message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP send failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Seam for sending mail, so the handler is testable without SMTP.
pub trait Notifier: Send + Sync {
    fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> impl std::future::Future<Output = Result<(), MailError>> + Send;
}

#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        use anyhow::Context;

        let creds = Credentials::new(config.smtp_user.clone(), config.smtp_pass.clone());

        // Port 465 is implicit TLS; everything else is STARTTLS.
        let builder = if config.smtp_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        }
        .context("Failed to create SMTP transport")?;

        let transport = builder
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        let from: Mailbox = config
            .from_email
            .parse()
            .context("Invalid FROM_EMAIL address")?;

        info!("Mailer initialized (SMTP: {}:{})", config.smtp_host, config.smtp_port);

        Ok(Mailer { transport, from })
    }
}

impl Notifier for Mailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let to: Mailbox = to
            .parse()
            .map_err(|_| MailError::BadAddress(to.to_string()))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        match self.transport.send(message).await {
            Ok(_) => {
                info!(to = %to, subject, "Email sent");
                Ok(())
            }
            Err(e) => {
                error!(to = %to, subject, error = %e, "Failed to send email");
                Err(e.into())
            }
        }
    }
}

// ── Message catalogue ──────────────────────────────────────────────────────

pub const SUBJECT_PIN: &str = "Votre code PIN pour la location de raquettes de padel";
pub const SUBJECT_FRONT_DESK: &str = "Raquettes de padel réservées à retirer à l'accueil";
pub const SUBJECT_INVALID_RESERVATION: &str = "Erreur sur la réservation de raquettes de padel";
pub const SUBJECT_SUPPORT_MISSING_EMAIL: &str =
    "[Erreur API HelloAsso] Email manquant dans le payload";
pub const SUBJECT_SUPPORT_PIN_FAILURE: &str =
    "[Erreur API HelloAsso] Échec de la génération du code PIN";

/// PIN + pickup instructions for the payer.
pub fn pin_body(
    item_name: &str,
    pin: &str,
    reservation: &str,
    variant: RacketVariant,
) -> String {
    format!(
        "Bonjour,

Voici votre code PIN « {item_name} » : {pin}

Date et heure de la location : {reservation} (le code PIN sera valide un peu avant et plusieurs heures après le début de la location)

Nombre de raquettes louées : {count}

Voici les instructions pour utiliser les raquettes de padel :
1- Allez au local matériel (à côté du panneau des lumières)
2- Sur le coffret électronique, entrez le code PIN à 9 chiffres, appuyez sur l'icone de déverrouillage pour valider, tirez sur le cadenas pour l'ouvrir et récupérer la clé du placard à raquettes
3- Ouvrez le placard avec la clé et prenez la ou les raquettes de padel que vous avez réservées
4- Remettez la clé dans le coffret et refermez-le
5- À la fin de votre créneau de location, remettez les raquettes dans le placard et refermez le coffret (avec le même code PIN)

Nous vous remercions de votre confiance et restons à votre disposition pour toute question.

À très bientôt sur les pistes !

Sportivement,

Le club Annecy Tennis",
        count = variant.count(),
    )
}

/// Pickup notice for the front desk.
pub fn front_desk_body(email: &str, reservation: &str, variant: RacketVariant) -> String {
    format!(
        "Bonjour,

Nous avons enregistré le paiement d'une location de raquettes de padel via HelloAsso à retirer à l'accueil.

Voici les détails de la location :
- Email : {email}
- Date et heure : {reservation}
- Nombre de raquettes louées : {count}

Sportivement,

P.S : Ce message est généré automatiquement par l'API HelloAsso.",
        count = variant.count(),
    )
}

/// Tells the payer their reservation time was unusable and will be refunded.
pub fn invalid_reservation_body(reservation: &str) -> String {
    format!(
        "Bonjour,

Votre demande de location de raquettes de padel n'a pas pu être traitée car la date et l'heure de début de location ({reservation}) sont trop anciennes ou incorrectes.

Vous pouvez essayer de soumettre une nouvelle demande avec des date/heure de location valides.

Nous vous rembourserons cette location erronée.

Sportivement,

Le club Annecy Tennis"
    )
}

/// Support report: the payload carried no payer email.
pub fn support_missing_email_body(payload_json: &str) -> String {
    format!("Aucune adresse e-mail n'a été trouvée dans le payload reçu :\n\n{payload_json}")
}

/// Support report: PIN generation failed for this payload.
pub fn support_pin_failure_body(error: &str, payload_json: &str) -> String {
    format!(
        "Une erreur est survenue lors de la génération du code PIN pour la réservation suivante :\n\n{payload_json}\n\nErreur : {error}"
    )
}
