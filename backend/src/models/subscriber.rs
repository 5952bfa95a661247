use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use validator::Validate;

text_enum! {
    SubscriberStatus {
        Pending => "pending",
        Active => "active",
        Unsubscribed => "unsubscribed",
        Bounced => "bounced",
    }
}

text_enum! {
    /// Topic a subscriber can opt in or out of.
    PreferenceTopic {
        Events => "events",
        Projects => "projects",
        Tips => "tips",
        Newsletter => "newsletter",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub events: bool,
    pub projects: bool,
    pub tips: bool,
    pub newsletter: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            events: true,
            projects: true,
            tips: true,
            newsletter: true,
        }
    }
}

impl Preferences {
    pub fn wants(&self, topic: PreferenceTopic) -> bool {
        match topic {
            PreferenceTopic::Events => self.events,
            PreferenceTopic::Projects => self.projects,
            PreferenceTopic::Tips => self.tips,
            PreferenceTopic::Newsletter => self.newsletter,
        }
    }

    pub fn apply(&mut self, patch: &PreferencesPatch) {
        if let Some(value) = patch.events {
            self.events = value;
        }
        if let Some(value) = patch.projects {
            self.projects = value;
        }
        if let Some(value) = patch.tips {
            self.tips = value;
        }
        if let Some(value) = patch.newsletter {
            self.newsletter = value;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferencesPatch {
    pub events: Option<bool>,
    pub projects: Option<bool>,
    pub tips: Option<bool>,
    pub newsletter: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscriber {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub status: SubscriberStatus,
    pub preferences: Json<Preferences>,
    #[serde(skip_serializing)]
    pub unsubscribe_token: String,
    pub source: Option<String>,
    pub subscribed_at: DateTime<Utc>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
    pub last_email_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubscribeRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 100))]
    pub name: Option<String>,
    pub preferences: Option<PreferencesPatch>,
    #[validate(length(max = 50))]
    pub source: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriberStatusRequest {
    pub status: SubscriberStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendNewsletterRequest {
    #[validate(length(min = 1, max = 200))]
    pub subject: String,
    /// HTML body.
    #[validate(length(min = 1, max = 200_000))]
    pub content: String,
    pub topic: Option<PreferenceTopic>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendNewsletterResponse {
    pub recipients: usize,
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, Deserialize)]
pub struct SubscriberListQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NewsletterStats {
    pub total: i64,
    pub active: i64,
    pub pending: i64,
    pub unsubscribed: i64,
    pub bounced: i64,
    pub new_last_30_days: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferences_default_to_everything() {
        let prefs = Preferences::default();
        for topic in PreferenceTopic::ALL {
            assert!(prefs.wants(*topic));
        }
    }

    #[test]
    fn preferences_patch_only_touches_given_topics() {
        let mut prefs = Preferences::default();
        prefs.apply(&PreferencesPatch {
            tips: Some(false),
            ..Default::default()
        });
        assert!(!prefs.wants(PreferenceTopic::Tips));
        assert!(prefs.wants(PreferenceTopic::Events));
    }

    #[test]
    fn subscriber_json_hides_unsubscribe_token() {
        let now = Utc::now();
        let subscriber = Subscriber {
            id: "s1".into(),
            email: "a@b.test".into(),
            name: None,
            status: SubscriberStatus::Active,
            preferences: Json(Preferences::default()),
            unsubscribe_token: "secret-token".into(),
            source: None,
            subscribed_at: now,
            unsubscribed_at: None,
            last_email_sent_at: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&subscriber).expect("json");
        assert!(json.get("unsubscribe_token").is_none());
    }
}
