use std::{future::Future, str::FromStr, time::Duration};

use axum::{
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Json,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use validator::Validate;

use crate::{
    error::AppError,
    models::{form::parse_datetime, media::ImageAsset},
    services::{
        batch::run_in_batches,
        media::{spawn_delete, UploadFile},
    },
    state::AppState,
    utils::slug::{slug_or_random, with_suffix},
};

const UPLOAD_BATCH_SIZE: usize = 4;
const UPLOAD_BATCH_DELAY: Duration = Duration::from_millis(250);
const MAX_SLUG_ATTEMPTS: usize = 5;

/// Parses an optional enum filter from the query string. Blank and `all`
/// mean "no filter".
pub fn parse_filter<T>(raw: Option<&str>, field: &str) -> Result<Option<T>, AppError>
where
    T: FromStr<Err = String>,
{
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) if value.eq_ignore_ascii_case("all") => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("Invalid `{}` filter: {}", field, value))),
    }
}

pub fn parse_timestamp(raw: Option<&str>, field: &str) -> Result<Option<DateTime<Utc>>, AppError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => parse_datetime(value).map(Some).ok_or_else(|| {
            AppError::BadRequest(format!(
                "`{}` must be a valid date (YYYY-MM-DD or RFC3339)",
                field
            ))
        }),
    }
}

pub fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Applies an optional text patch where an empty string clears the column.
pub fn patch_optional(target: &mut Option<String>, patch: Option<String>) {
    if let Some(value) = patch {
        *target = trimmed(Some(value));
    }
}

/// Body of a content write: multipart text fields (or a JSON object) plus any
/// uploaded files.
#[derive(Debug, Default)]
pub struct ContentForm {
    pub fields: Map<String, Value>,
    pub files: Vec<(String, UploadFile)>,
}

impl ContentForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = ContentForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| AppError::BadRequest(err.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name.is_empty() {
                continue;
            }

            if let Some(file_name) = field.file_name().map(str::to_string) {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::BadRequest(err.body_text()))?;
                // browsers send an empty part for an untouched file input
                if bytes.is_empty() && file_name.is_empty() {
                    continue;
                }
                form.files.push((
                    name,
                    UploadFile {
                        file_name,
                        content_type,
                        bytes,
                    },
                ));
                continue;
            }

            let text = field
                .text()
                .await
                .map_err(|err| AppError::BadRequest(err.body_text()))?;
            form.push_field(name, Value::String(text));
        }
        Ok(form)
    }

    // Repeated text fields collapse into an array.
    fn push_field(&mut self, name: String, value: Value) {
        match self.fields.get_mut(&name) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                self.fields.insert(name, value);
            }
        }
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadFile> {
        let index = self.files.iter().position(|(field, _)| field == name)?;
        Some(self.files.remove(index).1)
    }

    pub fn take_files(&mut self, name: &str) -> Vec<UploadFile> {
        let (matching, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(field, _)| field == name);
        self.files = rest;
        matching.into_iter().map(|(_, file)| file).collect()
    }

    /// Deserializes and validates the text fields as `T`.
    pub fn payload<T>(&self) -> Result<T, AppError>
    where
        T: DeserializeOwned + Validate,
    {
        let payload: T = serde_json::from_value(Value::Object(self.fields.clone()))
            .map_err(|err| AppError::BadRequest(format!("Invalid request body: {}", err)))?;
        payload.validate()?;
        Ok(payload)
    }
}

impl<S> FromRequest<S> for ContentForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("multipart/form-data"))
            .unwrap_or(false);

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|err| AppError::BadRequest(err.body_text()))?;
            return Self::from_multipart(multipart).await;
        }

        let Json(fields) = Json::<Map<String, Value>>::from_request(req, state)
            .await
            .map_err(|err| AppError::BadRequest(err.body_text()))?;
        Ok(Self {
            fields,
            files: Vec::new(),
        })
    }
}

pub async fn upload_image(
    state: &AppState,
    file: UploadFile,
    folder: &str,
) -> Result<ImageAsset, AppError> {
    Ok(state.media.upload(file, folder).await?)
}

/// Uploads in small concurrent batches. On any failure the images that did
/// make it are deleted again and the first error is returned.
pub async fn upload_images(
    state: &AppState,
    files: Vec<UploadFile>,
    folder: &str,
) -> Result<Vec<ImageAsset>, AppError> {
    if files.is_empty() {
        return Ok(Vec::new());
    }

    let store = state.media.clone();
    let folder = folder.to_string();
    let results = run_in_batches(files, UPLOAD_BATCH_SIZE, UPLOAD_BATCH_DELAY, move |file| {
        let store = store.clone();
        let folder = folder.clone();
        async move { store.upload(file, &folder).await }
    })
    .await;

    let mut uploaded = Vec::with_capacity(results.len());
    let mut first_error = None;
    for result in results {
        match result {
            Ok(image) => uploaded.push(image),
            Err(err) if first_error.is_none() => first_error = Some(err),
            Err(err) => tracing::warn!(error = %err, "Additional image upload failure"),
        }
    }

    if let Some(err) = first_error {
        discard_images(
            state,
            uploaded.into_iter().map(|image| image.public_id).collect(),
        );
        return Err(err.into());
    }
    Ok(uploaded)
}

pub fn discard_images(state: &AppState, public_ids: Vec<String>) {
    spawn_delete(state.media.clone(), public_ids);
}

/// Picks a slug from `title` that `exists` reports as free.
pub async fn unique_slug<F, Fut>(title: &str, mut exists: F) -> Result<String, AppError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, sqlx::Error>>,
{
    let base = slug_or_random(title);
    let mut candidate = base.clone();
    for _ in 0..MAX_SLUG_ATTEMPTS {
        if !exists(candidate.clone()).await? {
            return Ok(candidate);
        }
        candidate = with_suffix(&base);
    }
    Err(AppError::Conflict("Could not allocate a unique slug".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::EventStatus;

    #[test]
    fn parse_filter_treats_blank_and_all_as_none() {
        assert_eq!(parse_filter::<EventStatus>(None, "status").unwrap(), None);
        assert_eq!(parse_filter::<EventStatus>(Some(" "), "status").unwrap(), None);
        assert_eq!(parse_filter::<EventStatus>(Some("ALL"), "status").unwrap(), None);
        assert_eq!(
            parse_filter::<EventStatus>(Some("upcoming"), "status").unwrap(),
            Some(EventStatus::Upcoming)
        );
        assert!(matches!(
            parse_filter::<EventStatus>(Some("soon"), "status"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp(Some("2026-01-02"), "from").unwrap().is_some());
        assert!(parse_timestamp(Some(""), "from").unwrap().is_none());
        assert!(parse_timestamp(Some("yesterday"), "from").is_err());
    }

    #[test]
    fn patch_optional_clears_on_blank() {
        let mut value = Some("https://old.test".to_string());
        patch_optional(&mut value, None);
        assert_eq!(value.as_deref(), Some("https://old.test"));
        patch_optional(&mut value, Some("  ".into()));
        assert_eq!(value, None);
    }

    #[test]
    fn repeated_fields_become_arrays() {
        let mut form = ContentForm::default();
        form.push_field("tags".into(), Value::String("a".into()));
        form.push_field("tags".into(), Value::String("b".into()));
        form.push_field("tags".into(), Value::String("c".into()));
        assert_eq!(form.fields["tags"], serde_json::json!(["a", "b", "c"]));
    }

    #[test]
    fn take_files_splits_by_field_name() {
        let file = |name: &str| UploadFile {
            file_name: name.into(),
            content_type: "image/png".into(),
            bytes: axum::body::Bytes::from_static(b"png"),
        };
        let mut form = ContentForm {
            fields: Map::new(),
            files: vec![
                ("images".into(), file("a.png")),
                ("cover_image".into(), file("c.png")),
                ("images".into(), file("b.png")),
            ],
        };
        let images = form.take_files("images");
        assert_eq!(images.len(), 2);
        assert_eq!(form.take_file("cover_image").map(|f| f.file_name).as_deref(), Some("c.png"));
        assert!(form.files.is_empty());
    }

    #[tokio::test]
    async fn unique_slug_appends_suffix_on_collision() {
        let slug = unique_slug("Rust Night", |candidate| async move {
            Ok::<_, sqlx::Error>(candidate == "rust-night")
        })
        .await
        .unwrap();
        assert!(slug.starts_with("rust-night-"));

        let taken = unique_slug("Rust Night", |_| async { Ok::<_, sqlx::Error>(true) }).await;
        assert!(matches!(taken, Err(AppError::Conflict(_))));
    }
}
