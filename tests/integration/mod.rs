//! Integration test entry point
//!
//! One compiled test binary; the modules below exercise the pypilot binary
//! against real git repositories built in temp directories.

mod helpers;
mod test_cli;
