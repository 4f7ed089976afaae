use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::message::{StreamId, UserId};

/// Stream metadata needed to draw a recipient header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub name: String,
    /// CSS colour, e.g. `#76ce90`.
    #[serde(default = "default_stream_color")]
    pub color: String,
}

fn default_stream_color() -> String {
    "#c2c2c2".to_string()
}

/// Rendering context that is not part of any message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BackgroundData {
    #[serde(default)]
    pub own_user_id: UserId,
    /// Display names used for private-message headers.
    #[serde(default)]
    pub users: BTreeMap<UserId, String>,
    #[serde(default)]
    pub streams: BTreeMap<StreamId, StreamInfo>,
    #[serde(default)]
    pub twenty_four_hour_time: bool,
    /// Offset applied to timestamps when formatting times of day.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Server API feature level. Does not change how anything is drawn.
    #[serde(default)]
    pub feature_level: u32,
}

impl BackgroundData {
    /// True when switching from `self` to `other` changes rendered output.
    ///
    /// Everything except the feature level is visible somewhere in the
    /// rendered tree.
    #[must_use]
    pub fn affects_rendering(&self, other: &Self) -> bool {
        self.own_user_id != other.own_user_id
            || self.users != other.users
            || self.streams != other.streams
            || self.twenty_four_hour_time != other.twenty_four_hour_time
            || self.utc_offset_minutes != other.utc_offset_minutes
    }

    #[must_use]
    pub fn user_name(&self, id: UserId) -> String {
        self.users
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("user {id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_level_does_not_affect_rendering() {
        let a = BackgroundData::default();
        let b = BackgroundData {
            feature_level: 250,
            ..BackgroundData::default()
        };
        assert_ne!(a, b);
        assert!(!a.affects_rendering(&b));
    }

    #[test]
    fn stream_colour_affects_rendering() {
        let mut a = BackgroundData::default();
        a.streams.insert(StreamId(1), StreamInfo {
            name: "general".into(),
            color: "#fff".into(),
        });
        let mut b = a.clone();
        if let Some(info) = b.streams.get_mut(&StreamId(1)) {
            info.color = "#000".into();
        }
        assert!(a.affects_rendering(&b));
    }

    #[test]
    fn unknown_users_get_placeholder_names() {
        let mut bg = BackgroundData::default();
        bg.users.insert(UserId(3), "Grace".into());
        assert_eq!(bg.user_name(UserId(3)), "Grace");
        assert_eq!(bg.user_name(UserId(4)), "user 4");
    }
}
