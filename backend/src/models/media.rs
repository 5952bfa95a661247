use serde::{Deserialize, Serialize};

/// An image stored on the media host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub url: String,
    pub public_id: String,
}

/// An image as returned to clients, with a derived thumbnail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageView {
    pub url: String,
    pub public_id: String,
    pub thumbnail_url: String,
}
