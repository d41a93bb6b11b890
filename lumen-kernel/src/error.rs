//! Launcher error types.
//!
//! Most failures in the kernel are absorbed where they happen (logged, the
//! operation becomes a no-op); only the poll boundary surfaces errors to
//! the embedding loop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LauncherError {
    #[error("poll failed: {0}")]
    Nix(#[from] nix::Error),
}
