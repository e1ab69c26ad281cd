//! Call entities

use crate::domain::shared::value_objects::UserId;
use serde::{Deserialize, Serialize};

/// The other party of a call, as handed to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl RemoteUser {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(id),
            name: name.into(),
            avatar: None,
        }
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }
}

/// Account profile stored under the profiles root
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub pseudo: Option<String>,
    #[serde(default)]
    pub numero: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl UserProfile {
    pub fn display_name(&self) -> &str {
        self.pseudo.as_deref().unwrap_or("Unknown User")
    }

    pub fn to_remote_user(&self) -> RemoteUser {
        RemoteUser {
            id: self.id.clone(),
            name: self.display_name().to_string(),
            avatar: self.image.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_to_remote_user() {
        let profile: UserProfile = serde_json::from_value(json!({
            "id": "u2",
            "email": "bob@example.com",
            "pseudo": "bob",
            "numero": "",
            "image": "https://cdn.example.com/bob.png"
        }))
        .unwrap();

        let remote = profile.to_remote_user();
        assert_eq!(remote.id, UserId::new("u2"));
        assert_eq!(remote.name, "bob");
        assert_eq!(remote.avatar.as_deref(), Some("https://cdn.example.com/bob.png"));
    }

    #[test]
    fn test_profile_without_pseudo() {
        let profile = UserProfile {
            id: UserId::new("u3"),
            ..Default::default()
        };
        assert_eq!(profile.display_name(), "Unknown User");
        assert!(profile.to_remote_user().avatar.is_none());
    }
}
