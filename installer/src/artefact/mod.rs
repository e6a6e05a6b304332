//! Release artefact integrity: digests, hash manifests, and verification.
//!
//! # Sub-modules
//!
//! - [`error`] - Validation errors for digests and manifests.
//! - [`manifest`] - `sha256sum`-style manifest lookup.
//! - [`sha256_digest`] - SHA-256 digest newtype (`Sha256Digest`).
//! - [`verification`] - The hash gate applied to fetched binaries.

pub mod error;
pub mod manifest;
pub mod sha256_digest;
pub mod verification;
