//! Store report mailer: renders the report template and sends it via SMTP.

use std::time::Instant;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use playerwatch_core::config::MailConfig;
use playerwatch_core::{Notifier, Player, PlayerwatchError, Result};

use crate::template::{ReportContext, Template, TemplateLoader};

/// Sends one HTML report per store to every configured recipient.
pub struct Mailer {
    config: MailConfig,
    template: Template,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl Mailer {
    /// Load the report template and prepare the SMTP transport.
    pub fn new(config: MailConfig, loader: &TemplateLoader) -> Result<Self> {
        let template = loader.load(&config.template_name).map_err(|e| {
            PlayerwatchError::Template(format!("mail template initialization failed: {e}"))
        })?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| PlayerwatchError::Mail(format!("SMTP relay: {e}")))?
            .port(config.port);
        if !config.password.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.from.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            config,
            template,
            transport: builder.build(),
        })
    }

    /// Store id shown in the report: the configured name, else the number.
    pub fn store_id(&self, store_number: i64) -> String {
        self.config
            .stores
            .get(&store_number.to_string())
            .filter(|id| !id.is_empty())
            .cloned()
            .unwrap_or_else(|| store_number.to_string())
    }

    /// Render the report body for one store.
    pub fn body(&self, store_number: i64, players: &[Player]) -> String {
        let store_id = self.store_id(store_number);
        self.template.render(&ReportContext {
            from: &self.config.from,
            to: &self.config.to,
            subject: &self.config.subject,
            store_number,
            store_id: &store_id,
            players,
        })
    }

    /// Build the complete message for one store.
    pub fn message(&self, store_number: i64, players: &[Player]) -> Result<Message> {
        let from: Mailbox = self
            .config
            .from
            .parse()
            .map_err(|e| PlayerwatchError::Mail(format!("Invalid from: {e}")))?;

        let mut builder = Message::builder()
            .from(from)
            .subject(format!("{}: {}", self.config.subject, self.store_id(store_number)))
            .header(ContentType::TEXT_HTML);

        for to in &self.config.to {
            let mailbox: Mailbox = to
                .parse()
                .map_err(|e| PlayerwatchError::Mail(format!("Invalid to '{to}': {e}")))?;
            builder = builder.to(mailbox);
        }

        builder
            .body(self.body(store_number, players))
            .map_err(|e| PlayerwatchError::Mail(format!("Build email: {e}")))
    }
}

#[async_trait]
impl Notifier for Mailer {
    async fn send(&self, store_number: i64, players: &[Player]) -> Result<()> {
        let start = Instant::now();
        let email = self.message(store_number, players)?;

        self.transport
            .send(email)
            .await
            .map_err(|e| PlayerwatchError::Mail(format!("SMTP send: {e}")))?;

        tracing::debug!(
            store = store_number,
            recipients = self.config.to.len(),
            elapsed = ?start.elapsed(),
            "📧 Mail sent"
        );
        Ok(())
    }
}
