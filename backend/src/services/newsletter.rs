use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};

use crate::{
    models::subscriber::{PreferenceTopic, SendNewsletterResponse, Subscriber},
    repositories::subscriber as subscriber_repo,
    services::{
        batch::run_in_batches,
        mailer::{Mailer, OutgoingEmail},
    },
    utils::email_templates,
};

pub const SEND_BATCH_SIZE: usize = 10;
pub const SEND_BATCH_DELAY: Duration = Duration::from_secs(1);
const UNSUBSCRIBE_TOKEN_LEN: usize = 48;

/// Random URL-safe token assigned once when a subscriber row is created.
pub fn generate_unsubscribe_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(UNSUBSCRIBE_TOKEN_LEN)
        .map(char::from)
        .collect()
}

pub fn unsubscribe_url(public_api_url: &str, token: &str) -> String {
    format!(
        "{}/api/newsletter/unsubscribe/{}",
        public_api_url.trim_end_matches('/'),
        token
    )
}

pub struct Campaign {
    pub site_name: String,
    pub subject: String,
    pub content_html: String,
    pub public_api_url: String,
}

/// Mails `campaign` to every recipient in batches and stamps the ones that
/// went out.
pub async fn send_campaign(
    pool: &PgPool,
    mailer: Arc<dyn Mailer>,
    campaign: Campaign,
    topic: PreferenceTopic,
) -> anyhow::Result<SendNewsletterResponse> {
    let recipients = subscriber_repo::active_recipients(pool, topic).await?;
    let total = recipients.len();
    tracing::info!(recipients = total, topic = %topic, "Sending newsletter");

    let campaign = Arc::new(campaign);
    let results = run_in_batches(recipients, SEND_BATCH_SIZE, SEND_BATCH_DELAY, |subscriber| {
        let mailer = mailer.clone();
        let campaign = campaign.clone();
        async move {
            let email = match campaign_email(&campaign, &subscriber) {
                Ok(email) => email,
                Err(err) => {
                    tracing::warn!(error = ?err, subscriber_id = %subscriber.id, "Failed to render newsletter");
                    return None;
                }
            };
            match mailer.send(email).await {
                Ok(()) => Some(subscriber.id),
                Err(err) => {
                    tracing::warn!(error = ?err, subscriber_id = %subscriber.id, "Newsletter delivery failed");
                    None
                }
            }
        }
    })
    .await;

    let delivered: Vec<String> = results.into_iter().flatten().collect();
    if let Err(err) = subscriber_repo::mark_emailed(pool, &delivered, Utc::now()).await {
        tracing::warn!(error = ?err, "Failed to stamp newsletter recipients");
    }

    Ok(SendNewsletterResponse {
        recipients: total,
        sent: delivered.len(),
        failed: total - delivered.len(),
    })
}

fn campaign_email(
    campaign: &Campaign,
    subscriber: &Subscriber,
) -> askama::Result<OutgoingEmail> {
    let link = unsubscribe_url(&campaign.public_api_url, &subscriber.unsubscribe_token);
    Ok(OutgoingEmail {
        to: subscriber.email.clone(),
        subject: campaign.subject.clone(),
        html_body: email_templates::newsletter_campaign(
            &campaign.site_name,
            &campaign.content_html,
            &link,
        )?,
        reply_to: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsubscribe_tokens_are_long_and_distinct() {
        let first = generate_unsubscribe_token();
        let second = generate_unsubscribe_token();
        assert_eq!(first.len(), UNSUBSCRIBE_TOKEN_LEN);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first, second);
    }

    #[test]
    fn unsubscribe_url_joins_without_double_slash() {
        assert_eq!(
            unsubscribe_url("https://api.club.test/", "abc"),
            "https://api.club.test/api/newsletter/unsubscribe/abc"
        );
    }
}
