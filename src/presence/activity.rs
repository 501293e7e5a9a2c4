//! Activity payloads for `SET_ACTIVITY`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ActivityConfig;

/// Command name used to set or clear the activity.
pub const SET_ACTIVITY: &str = "SET_ACTIVITY";

/// App id the host sends when no game is running.
pub const NO_APP: &str = "0";

/// Whether `app_id` is the "no game" sentinel (`"0"` or `"none"`).
#[must_use]
pub fn is_no_app(app_id: &str) -> bool {
    app_id == NO_APP || app_id.eq_ignore_ascii_case("none")
}

/// Game metadata supplied by the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameDetails {
    /// Name shown in the "Playing ..." line.
    pub display_name: String,
}

impl GameDetails {
    /// Creates new details for the game called `display_name`.
    #[must_use]
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
        }
    }
}

/// Image keys or URLs shown next to the activity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assets {
    pub large_image: String,
    pub small_image: String,
}

/// When the activity started, for the elapsed-time counter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Timestamps {
    /// Unix seconds.
    pub start: i64,
}

/// The rich presence activity shown on the user's profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Activity {
    pub state: String,
    pub details: String,
    pub assets: Assets,
    pub timestamps: Timestamps,
}

impl Activity {
    /// Builds the activity for a running game.
    #[must_use]
    pub fn for_game(
        config: &ActivityConfig,
        app_id: &str,
        details: &GameDetails,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            state: config.state.clone(),
            details: format!("Playing {}", details.display_name),
            assets: Assets {
                large_image: config.large_image(app_id),
                small_image: config.small_image.clone(),
            },
            timestamps: Timestamps {
                start: started_at.timestamp(),
            },
        }
    }
}

/// Arguments of `SET_ACTIVITY`. Without an activity the status is cleared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetActivityArgs {
    pub pid: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
}

impl SetActivityArgs {
    #[must_use]
    pub fn clear(pid: u32) -> Self {
        Self {
            pid,
            activity: None,
        }
    }

    #[must_use]
    pub fn set(pid: u32, activity: Activity) -> Self {
        Self {
            pid,
            activity: Some(activity),
        }
    }
}
