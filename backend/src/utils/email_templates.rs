//! HTML bodies for transactional and newsletter mail, rendered from
//! `templates/email`.

use askama::Template;

/// Blank-line separated blocks of text, each split into lines.
fn paragraphs(text: &str) -> Vec<Vec<&str>> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| block.lines().collect())
        .collect()
}

#[derive(Template)]
#[template(path = "email/contact_notification.html")]
struct ContactNotificationEmail<'a> {
    site_name: &'a str,
    name: &'a str,
    email: &'a str,
    phone: &'a str,
    subject: &'a str,
    paragraphs: Vec<Vec<&'a str>>,
}

#[derive(Template)]
#[template(path = "email/contact_auto_reply.html")]
struct ContactAutoReplyEmail<'a> {
    site_name: &'a str,
    name: &'a str,
    subject: &'a str,
}

#[derive(Template)]
#[template(path = "email/contact_reply.html")]
struct ContactReplyEmail<'a> {
    site_name: &'a str,
    name: &'a str,
    original_subject: &'a str,
    paragraphs: Vec<Vec<&'a str>>,
}

#[derive(Template)]
#[template(path = "email/newsletter_welcome.html")]
struct NewsletterWelcomeEmail<'a> {
    site_name: &'a str,
    name: Option<&'a str>,
    unsubscribe_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/newsletter_campaign.html")]
struct NewsletterCampaignEmail<'a> {
    site_name: &'a str,
    content_html: &'a str,
    unsubscribe_url: &'a str,
}

pub struct ContactNotification<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub subject: &'a str,
    pub message: &'a str,
}

pub fn contact_admin_notification(
    site_name: &str,
    contact: &ContactNotification<'_>,
) -> askama::Result<String> {
    ContactNotificationEmail {
        site_name,
        name: contact.name,
        email: contact.email,
        phone: contact.phone.unwrap_or("-"),
        subject: contact.subject,
        paragraphs: paragraphs(contact.message),
    }
    .render()
}

pub fn contact_auto_reply(site_name: &str, name: &str, subject: &str) -> askama::Result<String> {
    ContactAutoReplyEmail {
        site_name,
        name,
        subject,
    }
    .render()
}

pub fn contact_reply(
    site_name: &str,
    name: &str,
    original_subject: &str,
    reply: &str,
) -> askama::Result<String> {
    ContactReplyEmail {
        site_name,
        name,
        original_subject,
        paragraphs: paragraphs(reply),
    }
    .render()
}

pub fn newsletter_welcome(
    site_name: &str,
    name: Option<&str>,
    unsubscribe_url: &str,
) -> askama::Result<String> {
    NewsletterWelcomeEmail {
        site_name,
        name,
        unsubscribe_url,
    }
    .render()
}

/// Campaign body is admin-authored HTML and is inserted as-is.
pub fn newsletter_campaign(
    site_name: &str,
    content_html: &str,
    unsubscribe_url: &str,
) -> askama::Result<String> {
    NewsletterCampaignEmail {
        site_name,
        content_html,
        unsubscribe_url,
    }
    .render()
}
