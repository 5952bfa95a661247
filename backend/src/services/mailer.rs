use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub reply_to: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    skip_send: bool,
}

impl SmtpMailer {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let transport = if config.smtp_username.is_empty() {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
                .port(config.smtp_port)
                .build()
        } else {
            let creds = Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            );
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
                .port(config.smtp_port)
                .credentials(creds)
                .build()
        };

        Ok(Self {
            transport,
            from: config.smtp_from_address.parse()?,
            skip_send: config.smtp_skip_send,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        if self.skip_send {
            tracing::debug!(to = %email.to, subject = %email.subject, "SMTP_SKIP_SEND set, not sending");
            return Ok(());
        }

        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(email.to.parse()?)
            .subject(email.subject)
            .header(ContentType::TEXT_HTML);
        if let Some(reply_to) = email.reply_to {
            builder = builder.reply_to(reply_to.parse()?);
        }
        let message = builder.body(email.html_body)?;

        self.transport.send(message).await?;
        Ok(())
    }
}

/// Sends without failing the caller; errors are logged.
pub async fn send_best_effort(mailer: &dyn Mailer, email: OutgoingEmail) -> bool {
    let to = email.to.clone();
    match mailer.send(email).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = ?err, to = %to, "Failed to send email");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            to: "member@club.test".into(),
            subject: "Hello".into(),
            html_body: "<p>hi</p>".into(),
            reply_to: None,
        }
    }

    #[tokio::test]
    async fn send_best_effort_swallows_errors() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("smtp down")));
        assert!(!send_best_effort(&mailer, email()).await);
    }

    #[tokio::test]
    async fn send_best_effort_reports_success() {
        let mut mailer = MockMailer::new();
        mailer.expect_send().times(1).returning(|_| Ok(()));
        assert!(send_best_effort(&mailer, email()).await);
    }
}
