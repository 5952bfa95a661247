use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{types::Json, FromRow};
use validator::Validate;

pub const SETTINGS_ROW_ID: i16 = 1;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteStats {
    pub members: i64,
    pub events: i64,
    pub projects: i64,
    pub workshops: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteFeatures {
    pub registrations_open: bool,
    pub newsletter_enabled: bool,
    pub tips_enabled: bool,
    pub gallery_enabled: bool,
    pub maintenance_mode: bool,
}

impl Default for SiteFeatures {
    fn default() -> Self {
        Self {
            registrations_open: true,
            newsletter_enabled: true,
            tips_enabled: true,
            gallery_enabled: true,
            maintenance_mode: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeoSettings {
    pub meta_title: String,
    pub meta_description: String,
    pub keywords: Vec<String>,
    pub og_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Settings {
    pub id: i16,
    pub site_name: String,
    pub tagline: String,
    pub description: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub address: String,
    pub logo_url: Option<String>,
    pub social_links: Json<Map<String, Value>>,
    pub stats: Json<SiteStats>,
    pub features: Json<SiteFeatures>,
    pub seo: Json<SeoSettings>,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The settings visible to anonymous visitors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicSettings {
    pub site_name: String,
    pub tagline: String,
    pub description: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub address: String,
    pub logo_url: Option<String>,
    pub social_links: Map<String, Value>,
    pub stats: SiteStats,
    pub features: SiteFeatures,
    pub seo: SeoSettings,
}

impl From<Settings> for PublicSettings {
    fn from(settings: Settings) -> Self {
        Self {
            site_name: settings.site_name,
            tagline: settings.tagline,
            description: settings.description,
            contact_email: settings.contact_email,
            contact_phone: settings.contact_phone,
            address: settings.address,
            logo_url: settings.logo_url,
            social_links: settings.social_links.0,
            stats: settings.stats.0,
            features: settings.features.0,
            seo: settings.seo.0,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateSettingsRequest {
    #[validate(length(min = 1, max = 100))]
    pub site_name: Option<String>,
    #[validate(length(max = 200))]
    pub tagline: Option<String>,
    #[validate(length(max = 5_000))]
    pub description: Option<String>,
    #[validate(email)]
    pub contact_email: Option<String>,
    #[validate(length(max = 30))]
    pub contact_phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    pub logo_url: Option<String>,
    pub social_links: Option<Map<String, Value>>,
    pub stats: Option<Map<String, Value>>,
    pub features: Option<Map<String, Value>>,
    pub seo: Option<Map<String, Value>>,
}

/// Overlays `patch` onto `current` key by key and re-validates the shape.
pub fn merge_nested<T>(current: &T, patch: &Map<String, Value>) -> Result<T, serde_json::Error>
where
    T: Serialize + DeserializeOwned,
{
    let mut value = serde_json::to_value(current)?;
    if let Value::Object(ref mut object) = value {
        for (key, entry) in patch {
            object.insert(key.clone(), entry.clone());
        }
    }
    serde_json::from_value(value)
}

/// Overlays `patch` onto a free-form map; `null` entries remove the key.
pub fn merge_map(current: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, entry) in patch {
        if entry.is_null() {
            current.remove(key);
        } else {
            current.insert(key.clone(), entry.clone());
        }
    }
}
