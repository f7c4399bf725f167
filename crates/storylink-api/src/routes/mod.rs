//! Route modules organized by concern.

pub mod devices;
pub mod health;
pub mod navigation;
pub mod playback;
pub mod relay;
pub mod story;
