use std::{sync::Arc, time::Instant};

use crate::{
    config::Config,
    db::connection::DbPool,
    services::{
        activity_log::{ActivityLogService, ActivityLogServiceTrait},
        mailer::{Mailer, SmtpMailer},
        media::{CloudinaryStore, MediaStore},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Config,
    pub media: Arc<dyn MediaStore>,
    pub mailer: Arc<dyn Mailer>,
    pub activity_log: Arc<dyn ActivityLogServiceTrait>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        pool: DbPool,
        config: Config,
        media: Arc<dyn MediaStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            activity_log: Arc::new(ActivityLogService::new(pool.clone())),
            pool,
            config,
            media,
            mailer,
            started_at: Instant::now(),
        }
    }

    /// Wires the real SMTP and media delegates from configuration.
    pub fn from_config(pool: DbPool, config: Config) -> anyhow::Result<Self> {
        let media: Arc<dyn MediaStore> = Arc::new(CloudinaryStore::from_config(&config)?);
        let mailer: Arc<dyn Mailer> = Arc::new(SmtpMailer::from_config(&config)?);
        Ok(Self::new(pool, config, media, mailer))
    }

    pub fn with_activity_log(mut self, service: Arc<dyn ActivityLogServiceTrait>) -> Self {
        self.activity_log = service;
        self
    }
}
