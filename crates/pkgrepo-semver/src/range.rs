//! Range parsing: npm range syntax translated into `semver::VersionReq` sets

use lazy_static::lazy_static;
use regex::Regex;
use semver::{Version, VersionReq};
use thiserror::Error;

/// Error type for range parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("Empty version range")]
    Empty,
    #[error("Could not parse version range \"{range}\": {reason}")]
    Invalid { range: String, reason: String },
}

lazy_static! {
    // `1.0.0 - 2.0.0`
    static ref HYPHEN_RE: Regex = Regex::new(r"^\s*(\S+)\s+-\s+(\S+)\s*$").unwrap();

    // `>= 1.0.0` is written `>=1.0.0` before splitting on whitespace
    static ref OPERATOR_SPACE_RE: Regex = Regex::new(r"(<=|>=|<|>|=|\^|~)\s+").unwrap();

    static ref COMPARATOR_RE: Regex = Regex::new(r"^(<=|>=|<|>|=|\^|~)?[vV]?(.+)$").unwrap();
}

fn invalid(range: &str, reason: impl Into<String>) -> RangeError {
    RangeError::Invalid {
        range: range.to_string(),
        reason: reason.into(),
    }
}

/// Split `1.2.3-beta+build` into its numeric core and the remainder.
fn split_suffix(text: &str) -> (&str, &str) {
    match text.find(['-', '+']) {
        Some(idx) => (&text[..idx], &text[idx..]),
        None => (text, ""),
    }
}

/// A version truncated at its first wildcard component.
///
/// `1.2.x` and `1.2` are both `[1, 2]`; `*` is empty and matches anything.
#[derive(Debug)]
struct Partial {
    parts: Vec<u64>,
    suffix: String,
}

impl Partial {
    fn parse(text: &str, range: &str) -> Result<Self, RangeError> {
        let (core, suffix) = split_suffix(text);

        let mut parts = Vec::with_capacity(3);
        let mut wildcard = false;
        for component in core.split('.') {
            if matches!(component, "x" | "X" | "*") {
                wildcard = true;
                break;
            }
            let number = component
                .parse::<u64>()
                .map_err(|_| invalid(range, format!("invalid version component \"{}\"", component)))?;
            parts.push(number);
        }

        if parts.len() > 3 {
            return Err(invalid(range, format!("too many version components in \"{}\"", text)));
        }

        // Prerelease tags only make sense on a complete version
        let suffix = if wildcard || parts.len() < 3 {
            String::new()
        } else {
            suffix.to_string()
        };

        Ok(Self { parts, suffix })
    }

    fn is_any(&self) -> bool {
        self.parts.is_empty()
    }

    fn render(&self) -> String {
        let core: Vec<String> = self.parts.iter().map(|p| p.to_string()).collect();
        format!("{}{}", core.join("."), self.suffix)
    }
}

fn strip_v(text: &str) -> &str {
    text.strip_prefix(['v', 'V']).unwrap_or(text)
}

fn translate_comparator(token: &str, range: &str) -> Result<Option<String>, RangeError> {
    let caps = COMPARATOR_RE
        .captures(token)
        .ok_or_else(|| invalid(range, format!("invalid comparator \"{}\"", token)))?;

    let partial = Partial::parse(&caps[2], range)?;
    if partial.is_any() {
        return Ok(None);
    }

    // A bare version is an exact match in npm, not a caret like in Cargo
    let op = caps.get(1).map(|m| m.as_str()).unwrap_or("=");
    Ok(Some(format!("{}{}", op, partial.render())))
}

fn translate_hyphen(lower: &str, upper: &str, range: &str) -> Result<Vec<String>, RangeError> {
    let mut comparators = Vec::with_capacity(2);

    let lower = Partial::parse(strip_v(lower), range)?;
    if !lower.is_any() {
        comparators.push(format!(">={}", lower.render()));
    }

    let upper = Partial::parse(strip_v(upper), range)?;
    let overflow = || invalid(range, format!("upper bound \"{}\" is out of range", upper.render()));
    match upper.parts.as_slice() {
        [] => {}
        [major] => {
            let next = major.checked_add(1).ok_or_else(overflow)?;
            comparators.push(format!("<{}", next));
        }
        [major, minor] => {
            let next = minor.checked_add(1).ok_or_else(overflow)?;
            comparators.push(format!("<{}.{}", major, next));
        }
        _ => comparators.push(format!("<={}", upper.render())),
    }

    Ok(comparators)
}

/// A parsed version range: a set of alternatives, any of which may match.
#[derive(Debug, Clone)]
pub struct Range {
    raw: String,
    alternatives: Vec<VersionReq>,
}

impl Range {
    /// Parse an npm-style range.
    pub fn parse(range: &str) -> Result<Self, RangeError> {
        let trimmed = range.trim();
        if trimmed.is_empty() {
            return Err(RangeError::Empty);
        }

        let mut alternatives = Vec::new();
        for alternative in trimmed.split("||") {
            let comparators = Self::translate_alternative(alternative.trim(), trimmed)?;
            let req = if comparators.is_empty() {
                VersionReq::STAR
            } else {
                VersionReq::parse(&comparators.join(", "))
                    .map_err(|e| invalid(trimmed, e.to_string()))?
            };
            alternatives.push(req);
        }

        Ok(Self {
            raw: trimmed.to_string(),
            alternatives,
        })
    }

    fn translate_alternative(alternative: &str, range: &str) -> Result<Vec<String>, RangeError> {
        if alternative.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(caps) = HYPHEN_RE.captures(alternative) {
            return translate_hyphen(&caps[1], &caps[2], range);
        }

        let collapsed = OPERATOR_SPACE_RE.replace_all(alternative, "$1");
        collapsed
            .split_whitespace()
            .map(|token| translate_comparator(token, range))
            .filter_map(Result::transpose)
            .collect()
    }

    /// Whether `version` satisfies any alternative of this range
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// The range as it was given (trimmed)
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Parse a version leniently.
///
/// Accepts a leading `v` or `=`, and pads partial versions:
/// - "v1.2.3" -> 1.2.3
/// - "1.2" -> 1.2.0
/// - "1" -> 1.0.0
pub fn parse_loose(version: &str) -> Option<Version> {
    let trimmed = version.trim().trim_start_matches('=');
    let trimmed = strip_v(trimmed);

    if let Ok(parsed) = Version::parse(trimmed) {
        return Some(parsed);
    }

    let (core, suffix) = split_suffix(trimmed);
    let padded = match core.split('.').count() {
        1 => format!("{}.0.0{}", core, suffix),
        2 => format!("{}.0{}", core, suffix),
        _ => return None,
    };
    Version::parse(&padded).ok()
}
