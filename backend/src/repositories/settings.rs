use chrono::Utc;
use serde_json::Map;
use sqlx::{types::Json, PgPool};

use crate::models::settings::{
    SeoSettings, Settings, SiteFeatures, SiteStats, SETTINGS_ROW_ID,
};

const SETTINGS_COLUMNS: &str = "id, site_name, tagline, description, contact_email, \
     contact_phone, address, logo_url, social_links, stats, features, seo, updated_by, \
     created_at, updated_at";

pub const DEFAULT_SITE_NAME: &str = "Clubhouse";

/// Returns the settings row, inserting the defaults the first time.
pub async fn get_or_create(pool: &PgPool) -> Result<Settings, sqlx::Error> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO settings (id, site_name, social_links, stats, features, seo, created_at, \
         updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $7) ON CONFLICT (id) DO NOTHING",
    )
    .bind(SETTINGS_ROW_ID)
    .bind(DEFAULT_SITE_NAME)
    .bind(Json(Map::new()))
    .bind(Json(SiteStats::default()))
    .bind(Json(SiteFeatures::default()))
    .bind(Json(SeoSettings {
        meta_title: DEFAULT_SITE_NAME.to_string(),
        ..Default::default()
    }))
    .bind(now)
    .execute(pool)
    .await?;

    sqlx::query_as::<_, Settings>(&format!(
        "SELECT {} FROM settings WHERE id = $1",
        SETTINGS_COLUMNS
    ))
    .bind(SETTINGS_ROW_ID)
    .fetch_one(pool)
    .await
}

pub async fn update_settings(pool: &PgPool, settings: &Settings) -> Result<Settings, sqlx::Error> {
    sqlx::query_as::<_, Settings>(&format!(
        "UPDATE settings SET site_name = $2, tagline = $3, description = $4, \
         contact_email = $5, contact_phone = $6, address = $7, logo_url = $8, \
         social_links = $9, stats = $10, features = $11, seo = $12, updated_by = $13, \
         updated_at = $14 WHERE id = $1 RETURNING {}",
        SETTINGS_COLUMNS
    ))
    .bind(settings.id)
    .bind(&settings.site_name)
    .bind(&settings.tagline)
    .bind(&settings.description)
    .bind(&settings.contact_email)
    .bind(&settings.contact_phone)
    .bind(&settings.address)
    .bind(&settings.logo_url)
    .bind(&settings.social_links)
    .bind(&settings.stats)
    .bind(&settings.features)
    .bind(&settings.seo)
    .bind(&settings.updated_by)
    .bind(settings.updated_at)
    .fetch_one(pool)
    .await
}
