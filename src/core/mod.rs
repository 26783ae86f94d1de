//! Core building blocks for the release pipeline
//!
//! - **context**: project layout discovery and the per-run release state
//! - **error**: unified error types with exit codes and contextual help
//! - **retry**: bounded fixed-delay retry for the post-upload availability poll
//! - **vcs**: git operations via system git (SystemGit)

pub mod context;
pub mod error;
pub mod retry;
pub mod vcs;
