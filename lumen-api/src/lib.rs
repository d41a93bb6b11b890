//! Lumen API - Shared types for the Lumen launcher engine.

mod action;
mod event;
mod plugin;
mod result;

pub use action::*;
pub use event::*;
pub use plugin::*;
pub use result::*;
