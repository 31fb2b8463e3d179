use serde::{Deserialize, Serialize};

/// Application-side profile fields pushed to the messaging backend on
/// connect, so the backend-side display name tracks the latest known values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: Option<String>,
    pub image_url: Option<String>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            image_url: None,
        }
    }
}
