//! Semver facade providing the range operations used by version selection

use crate::range::{parse_loose, Range};

/// Main facade for range matching
pub struct Semver;

impl Semver {
    /// Check if a version satisfies a range
    pub fn satisfies(version: &str, range: &str) -> bool {
        let parsed = match parse_loose(version) {
            Some(v) => v,
            None => return false,
        };

        match Range::parse(range) {
            Ok(range) => range.matches(&parsed),
            Err(_) => false,
        }
    }

    /// Check whether a string parses as a range
    pub fn valid_range(range: &str) -> bool {
        Range::parse(range).is_ok()
    }

    /// Return all versions that satisfy the range, in their original order
    pub fn satisfied_by<S: AsRef<str>>(versions: &[S], range: &str) -> Vec<String> {
        let range = match Range::parse(range) {
            Ok(r) => r,
            Err(_) => return Vec::new(),
        };

        versions
            .iter()
            .map(AsRef::as_ref)
            .filter(|v| parse_loose(v).is_some_and(|parsed| range.matches(&parsed)))
            .map(str::to_string)
            .collect()
    }

    /// Return the highest version that satisfies the range.
    ///
    /// The original string is returned, not its normalized form, so callers
    /// can use it as a lookup key. On ties the first occurrence wins.
    pub fn max_satisfying<S: AsRef<str>>(versions: &[S], range: &str) -> Option<String> {
        let range = Range::parse(range).ok()?;

        let mut best: Option<(semver::Version, &str)> = None;
        for candidate in versions.iter().map(AsRef::as_ref) {
            let Some(parsed) = parse_loose(candidate) else {
                continue;
            };
            if !range.matches(&parsed) {
                continue;
            }
            match &best {
                Some((current, _)) if *current >= parsed => {}
                _ => best = Some((parsed, candidate)),
            }
        }

        best.map(|(_, original)| original.to_string())
    }

    /// Sort versions in descending order, dropping unparseable ones
    pub fn rsort<S: AsRef<str>>(versions: &[S]) -> Vec<String> {
        let mut parsed: Vec<(semver::Version, &str)> = versions
            .iter()
            .map(AsRef::as_ref)
            .filter_map(|v| parse_loose(v).map(|p| (p, v)))
            .collect();
        parsed.sort_by(|(a, _), (b, _)| b.cmp(a));
        parsed.into_iter().map(|(_, v)| v.to_string()).collect()
    }
}
