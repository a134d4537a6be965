pub mod actions;
pub mod error;
pub mod messages;
pub mod reactions;
pub mod state;
