//! npm-style version range matching
//!
//! This crate provides the range matching used when a requested version is
//! neither an exact version nor a known tag: `^1.2.0`, `~1.2`, `>=1.0.0 <2.0.0`,
//! `1.2.x`, `1.0.0 - 2.0.0` and `||` alternatives, evaluated with the
//! `semver` crate.

mod matcher;
mod range;

pub use matcher::Semver;
pub use range::{parse_loose, Range, RangeError};
