//! k3s installer library.
//!
//! This crate installs and upgrades k3s as a systemd service. It resolves a
//! release, verifies the downloaded binary against its published hash,
//! writes the unit and environment files, and restarts the service only when
//! something on disk changed. It is used by the `k3s-install` CLI binary and
//! can be driven programmatically with substitute transports and service
//! managers for testing.
//!
//! # Modules
//!
//! - [`artefact`] - Digests, hash manifests and verification policy
//! - [`binary`] - Idempotent, atomic installation of the k3s binary
//! - [`cli`] - Command-line argument definitions
//! - [`command`] - External command execution
//! - [`config`] - Validated run configuration
//! - [`environment`] - Environment file capture and writing
//! - [`error`] - Semantic error types
//! - [`layout`] - Installed file locations
//! - [`lifecycle`] - Install and upgrade orchestration
//! - [`output`] - Operator-facing progress output
//! - [`platform`] - Host platform verification
//! - [`release`] - Release resolution
//! - [`service`] - systemd unit management
//! - [`snapshot`] - Before/after digests used to gate restarts
//! - [`symlinks`] - `kubectl`, `crictl` and `ctr` links
//! - [`tempdir`] - Scratch directories cleaned up on interrupt
//! - [`transport`] - Download backends
//! - [`uninstall`] - Uninstall script generation

pub mod artefact;
pub mod binary;
pub mod cli;
pub mod command;
pub mod config;
pub mod environment;
pub mod error;
pub mod layout;
pub mod lifecycle;
pub mod output;
pub mod platform;
pub mod release;
pub mod service;
pub mod snapshot;
pub mod symlinks;
pub mod tempdir;
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
pub mod transport;
pub mod uninstall;
