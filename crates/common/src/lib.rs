//! Common utilities shared across the item dashboard crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT structural utilities (size limit, header parsing, iat skew)
pub mod jwt;
