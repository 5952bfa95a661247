use axum::{
    extract::{Extension, State},
    Json,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::common::trimmed,
    models::{
        settings::{merge_map, merge_nested, PublicSettings, Settings, UpdateSettingsRequest},
        user::User,
    },
    repositories::settings as settings_repo,
    state::AppState,
};

pub async fn get_public_settings(
    State(state): State<AppState>,
) -> Result<Json<PublicSettings>, AppError> {
    let settings = settings_repo::get_or_create(&state.pool).await?;
    Ok(Json(settings.into()))
}

pub async fn get_settings(State(state): State<AppState>) -> Result<Json<Settings>, AppError> {
    Ok(Json(settings_repo::get_or_create(&state.pool).await?))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<UpdateSettingsRequest>,
) -> Result<Json<Settings>, AppError> {
    payload.validate()?;
    let mut settings = settings_repo::get_or_create(&state.pool).await?;
    apply_update(&mut settings, payload)?;
    settings.updated_by = Some(user.id);
    settings.updated_at = Utc::now();
    Ok(Json(settings_repo::update_settings(&state.pool, &settings).await?))
}

fn apply_update(settings: &mut Settings, payload: UpdateSettingsRequest) -> Result<(), AppError> {
    if let Some(site_name) = payload.site_name {
        let site_name = site_name.trim().to_string();
        if site_name.is_empty() {
            return Err(AppError::BadRequest("site_name must not be blank".into()));
        }
        settings.site_name = site_name;
    }
    if let Some(tagline) = payload.tagline {
        settings.tagline = tagline.trim().to_string();
    }
    if let Some(description) = payload.description {
        settings.description = description;
    }
    if let Some(contact_email) = payload.contact_email {
        settings.contact_email = contact_email.trim().to_lowercase();
    }
    if let Some(contact_phone) = payload.contact_phone {
        settings.contact_phone = contact_phone.trim().to_string();
    }
    if let Some(address) = payload.address {
        settings.address = address.trim().to_string();
    }
    if payload.logo_url.is_some() {
        settings.logo_url = trimmed(payload.logo_url);
    }
    if let Some(links) = payload.social_links {
        merge_map(&mut settings.social_links.0, &links);
    }
    if let Some(stats) = payload.stats {
        settings.stats.0 = merge_nested(&settings.stats.0, &stats)
            .map_err(|err| AppError::BadRequest(format!("Invalid stats: {}", err)))?;
    }
    if let Some(features) = payload.features {
        settings.features.0 = merge_nested(&settings.features.0, &features)
            .map_err(|err| AppError::BadRequest(format!("Invalid features: {}", err)))?;
    }
    if let Some(seo) = payload.seo {
        settings.seo.0 = merge_nested(&settings.seo.0, &seo)
            .map_err(|err| AppError::BadRequest(format!("Invalid seo: {}", err)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::settings::{SeoSettings, SiteFeatures, SiteStats, SETTINGS_ROW_ID};
    use serde_json::{json, Map, Value};
    use sqlx::types::Json as DbJson;

    fn settings() -> Settings {
        let now = Utc::now();
        Settings {
            id: SETTINGS_ROW_ID,
            site_name: "Clubhouse".into(),
            tagline: String::new(),
            description: String::new(),
            contact_email: "hello@club.test".into(),
            contact_phone: String::new(),
            address: String::new(),
            logo_url: None,
            social_links: DbJson(Map::new()),
            stats: DbJson(SiteStats::default()),
            features: DbJson(SiteFeatures::default()),
            seo: DbJson(SeoSettings::default()),
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn nested_update_keeps_untouched_flags() {
        let mut current = settings();
        apply_update(
            &mut current,
            UpdateSettingsRequest {
                features: Some(object(json!({ "registrations_open": false }))),
                stats: Some(object(json!({ "members": 42 }))),
                ..Default::default()
            },
        )
        .expect("update");
        assert!(!current.features.0.registrations_open);
        assert!(current.features.0.newsletter_enabled);
        assert_eq!(current.stats.0.members, 42);
        assert_eq!(current.site_name, "Clubhouse");
    }

    #[test]
    fn badly_typed_nested_value_is_rejected() {
        let mut current = settings();
        let result = apply_update(
            &mut current,
            UpdateSettingsRequest {
                stats: Some(object(json!({ "events": "many" }))),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn blank_site_name_is_rejected() {
        let mut current = settings();
        let result = apply_update(
            &mut current,
            UpdateSettingsRequest {
                site_name: Some("   ".into()),
                ..Default::default()
            },
        );
        assert!(result.is_err());
    }
}
