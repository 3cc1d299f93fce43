//! Listener identity and roles

use super::ids::ListenerId;
use serde::{Deserialize, Serialize};

/// Role granted to a listener account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerRole {
    /// Free tier (hears advertisements)
    Free,

    /// Paying subscriber
    Premium,

    /// Administrator
    Admin,

    /// Artist account
    Artist,
}

impl ListenerRole {
    /// Roles that never hear advertisements
    pub fn is_ad_exempt(self) -> bool {
        matches!(self, Self::Premium | Self::Admin | Self::Artist)
    }
}

/// A listener together with the roles resolved for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listener {
    pub id: ListenerId,
    pub roles: Vec<ListenerRole>,
}

impl Listener {
    pub fn new(id: impl Into<String>, roles: Vec<ListenerRole>) -> Self {
        Self {
            id: ListenerId::new(id),
            roles,
        }
    }

    /// Whether any of the listener's roles exempts them from ads
    pub fn is_ad_exempt(&self) -> bool {
        self.roles.iter().any(|r| r.is_ad_exempt())
    }
}
