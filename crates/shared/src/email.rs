//! Email service for expense notifications.
//!
//! Uses `lettre` for SMTP transport.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use thiserror::Error;

use crate::config::EmailConfig;
use crate::types::{ExpenseId, Money};

/// Email service errors.
#[derive(Debug, Error)]
pub enum EmailError {
    /// Failed to build email message.
    #[error("Failed to build email: {0}")]
    BuildError(String),
    /// Failed to send email.
    #[error("Failed to send email: {0}")]
    SendError(String),
    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
    /// Message had nobody to go to.
    #[error("No recipients")]
    NoRecipients,
}

/// Email service for sending transactional emails.
#[derive(Debug, Clone)]
pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    /// Creates a new email service.
    #[must_use]
    pub const fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Creates an SMTP transport.
    fn create_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, EmailError> {
        let builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.smtp_host)
            .port(self.config.smtp_port);

        let builder = if self.config.smtp_username.is_empty() {
            builder
        } else {
            builder.credentials(Credentials::new(
                self.config.smtp_username.clone(),
                self.config.smtp_password.clone(),
            ))
        };

        Ok(builder.build())
    }

    /// Builds the "new expense" message for every recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no recipients or an address is invalid.
    pub fn build_expense_message(
        &self,
        recipients: &[String],
        expense_id: ExpenseId,
        description: &str,
        amount: Money,
    ) -> Result<Message, EmailError> {
        if recipients.is_empty() {
            return Err(EmailError::NoRecipients);
        }

        let from: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .map_err(|e| EmailError::InvalidAddress(format!("{e}")))?;

        let mut builder = Message::builder()
            .from(from)
            .subject(format!("New shared expense: {description}"))
            .header(ContentType::TEXT_PLAIN);

        for recipient in recipients {
            let mailbox: Mailbox = recipient
                .parse()
                .map_err(|e| EmailError::InvalidAddress(format!("{recipient}: {e}")))?;
            builder = builder.to(mailbox);
        }

        let body = format!(
            r"Hi,

A new expense was added to one of your groups.

  Description: {description}
  Amount:      {amount}
  Reference:   {expense_id}

Open Tally to see how it was split.

The Tally Team"
        );

        builder
            .body(body)
            .map_err(|e| EmailError::BuildError(e.to_string()))
    }

    /// Sends the "new expense" notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be built or sent.
    pub async fn send_expense_notification(
        &self,
        recipients: &[String],
        expense_id: ExpenseId,
        description: &str,
        amount: Money,
    ) -> Result<(), EmailError> {
        let email = self.build_expense_message(recipients, expense_id, description, amount)?;

        let transport = self.create_transport()?;
        transport
            .send(email)
            .await
            .map_err(|e| EmailError::SendError(e.to_string()))?;

        Ok(())
    }
}
