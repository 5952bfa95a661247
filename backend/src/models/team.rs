use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use validator::Validate;

use crate::{
    models::{form, media::ImageAsset},
    validation::rules::validate_not_blank,
};

text_enum! {
    TeamStatus {
        Active => "active",
        Alumni => "alumni",
        Inactive => "inactive",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl SocialLinks {
    /// Overlays non-empty values from `patch`; an empty string clears a link.
    pub fn merge(&mut self, patch: SocialLinks) {
        fn apply(target: &mut Option<String>, value: Option<String>) {
            if let Some(value) = value {
                let trimmed = value.trim();
                *target = if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                };
            }
        }
        apply(&mut self.linkedin, patch.linkedin);
        apply(&mut self.github, patch.github);
        apply(&mut self.twitter, patch.twitter);
        apply(&mut self.website, patch.website);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    pub position: String,
    pub department: String,
    pub bio: Option<String>,
    pub email: Option<String>,
    pub image: Option<Json<ImageAsset>>,
    pub social: Json<SocialLinks>,
    pub display_order: i32,
    pub year: Option<i32>,
    pub status: TeamStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TeamMember {
    pub fn image_public_id(&self) -> Option<String> {
        self.image.as_ref().map(|image| image.0.public_id.clone())
    }
}

/// Multipart forms send `social` either as a JSON object string or as
/// individual `linkedin`/`github`/... fields.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTeamMemberRequest {
    #[validate(length(min = 2, max = 100), custom(function = "validate_not_blank"))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub position: String,
    #[validate(length(min = 1, max = 100))]
    pub department: String,
    #[validate(length(max = 2_000))]
    pub bio: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub social: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub twitter: Option<String>,
    pub website: Option<String>,
    #[serde(default, deserialize_with = "form::i32_opt")]
    pub display_order: Option<i32>,
    #[serde(default, deserialize_with = "form::i32_opt")]
    #[validate(range(min = 1990, max = 2100))]
    pub year: Option<i32>,
    pub status: Option<TeamStatus>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTeamMemberRequest {
    #[validate(length(min = 2, max = 100), custom(function = "validate_not_blank"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub position: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub department: Option<String>,
    #[validate(length(max = 2_000))]
    pub bio: Option<String>,
    /// Empty string clears the address.
    pub email: Option<String>,
    pub social: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub twitter: Option<String>,
    pub website: Option<String>,
    #[serde(default, deserialize_with = "form::i32_opt")]
    pub display_order: Option<i32>,
    #[serde(default, deserialize_with = "form::i32_opt")]
    #[validate(range(min = 1990, max = 2100))]
    pub year: Option<i32>,
    pub status: Option<TeamStatus>,
}

/// Collects social links from a JSON `social` field and the flat fields,
/// flat fields taking precedence.
pub fn social_patch(
    social: Option<&str>,
    linkedin: Option<String>,
    github: Option<String>,
    twitter: Option<String>,
    website: Option<String>,
) -> Result<SocialLinks, serde_json::Error> {
    let mut links = match social.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => serde_json::from_str::<SocialLinks>(raw)?,
        None => SocialLinks::default(),
    };
    links.linkedin = linkedin.or(links.linkedin);
    links.github = github.or(links.github);
    links.twitter = twitter.or(links.twitter);
    links.website = website.or(links.website);
    Ok(links)
}

#[derive(Debug, Deserialize)]
pub struct TeamListQuery {
    pub department: Option<String>,
    pub year: Option<i32>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ReorderItem {
    pub id: String,
    pub display_order: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReorderRequest {
    #[validate(length(min = 1, max = 500))]
    pub items: Vec<ReorderItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn social_patch_prefers_flat_fields() {
        let links = social_patch(
            Some(r#"{"github":"https://github.com/old","twitter":"https://x.com/a"}"#),
            None,
            Some("https://github.com/new".into()),
            None,
            None,
        )
        .expect("parse");
        assert_eq!(links.github.as_deref(), Some("https://github.com/new"));
        assert_eq!(links.twitter.as_deref(), Some("https://x.com/a"));
        assert!(links.linkedin.is_none());
    }

    #[test]
    fn merge_clears_on_empty_string() {
        let mut current = SocialLinks {
            github: Some("https://github.com/a".into()),
            website: Some("https://a.dev".into()),
            ..Default::default()
        };
        current.merge(SocialLinks {
            website: Some("".into()),
            ..Default::default()
        });
        assert_eq!(current.github.as_deref(), Some("https://github.com/a"));
        assert!(current.website.is_none());
    }
}
