//! Rich presence session API.
//!
//! [`Presence`] is what the host talks to: it owns the IPC connection and
//! turns "a game started" / "the game stopped" into `SET_ACTIVITY` commands.

pub mod activity;
mod session;

pub use activity::{is_no_app, Activity, GameDetails, SetActivityArgs, NO_APP, SET_ACTIVITY};
pub use session::Presence;
