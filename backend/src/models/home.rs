use serde::{Deserialize, Serialize};

use crate::models::{
    event::Event, gallery::GalleryItemResponse, project::Project, settings::PublicSettings,
    tip::Tip,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct HomeResponse {
    pub settings: PublicSettings,
    pub upcoming_events: Vec<Event>,
    pub featured_projects: Vec<Project>,
    pub recent_gallery: Vec<GalleryItemResponse>,
    pub latest_tips: Vec<Tip>,
    pub team_count: i64,
}
