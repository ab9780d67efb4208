//! Choosing which version to fetch from what a backend offers.

use indexmap::IndexMap;
use pkgrepo_semver::Semver;
use thiserror::Error;

use super::VersionRecord;

/// Nothing offered by the backend matches the request
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{reason}")]
pub struct NoMatchedVersion {
    pub requested: Option<String>,
    pub reason: String,
    pub candidate_versions: Vec<String>,
    pub candidate_tags: Vec<String>,
}

pub type FetchVersionOutcome = std::result::Result<VersionRecord, NoMatchedVersion>;

fn join_or_na(items: &[String]) -> String {
    if items.is_empty() {
        "n/a".to_string()
    } else {
        items.join(", ")
    }
}

/// Pick the record to fetch for `requested`.
///
/// Precedence, first hit wins:
/// 1. a version whose string equals the request
/// 2. a tag whose name equals the request
/// 3. the highest version satisfying the request as a range
/// 4. for an empty request, the first version, else the first tag
///
/// Duplicate versions or tags resolve to the last one given.
pub fn select_fetch_version(
    name: &str,
    requested: Option<&str>,
    versions: &[VersionRecord],
    tags: &[VersionRecord],
) -> FetchVersionOutcome {
    let requested = requested.filter(|r| !r.is_empty());

    let mut version_map: IndexMap<&str, &VersionRecord> = IndexMap::new();
    for record in versions {
        version_map.insert(record.version.as_str(), record);
    }

    let mut tag_map: IndexMap<&str, &VersionRecord> = IndexMap::new();
    for record in tags {
        if let Some(tag) = record.tag.as_deref() {
            tag_map.insert(tag, record);
        }
    }

    let chosen = match requested {
        Some(request) => version_map
            .get(request)
            .or_else(|| tag_map.get(request))
            .copied()
            .or_else(|| {
                let candidates: Vec<&str> = version_map.keys().copied().collect();
                Semver::max_satisfying(&candidates, request)
                    .and_then(|best| version_map.get(best.as_str()).copied())
            }),
        None => versions.first().or_else(|| tags.first()),
    };

    if let Some(record) = chosen {
        return Ok(record.clone());
    }

    let candidate_versions: Vec<String> = version_map.keys().map(|v| v.to_string()).collect();
    let candidate_tags: Vec<String> = tag_map.keys().map(|t| t.to_string()).collect();

    let package = match requested {
        Some(request) => format!("{}@{}", name, request),
        None => name.to_string(),
    };
    let reason = format!(
        "No matched version for {}, candidates = {}, tags = {}",
        package,
        join_or_na(&candidate_versions),
        join_or_na(&candidate_tags)
    );

    Err(NoMatchedVersion {
        requested: requested.map(str::to_string),
        reason,
        candidate_versions,
        candidate_tags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions(list: &[&str]) -> Vec<VersionRecord> {
        list.iter().map(|v| VersionRecord::new(*v)).collect()
    }

    #[test]
    fn test_exact_version_beats_tag() {
        let versions = versions(&["1.0.0", "2.0.0"]);
        let tags = vec![VersionRecord::tagged("1.0.0", "2.0.0")];

        let record = select_fetch_version("pkg", Some("1.0.0"), &versions, &tags).unwrap();
        assert_eq!(record.version, "1.0.0");
        assert_eq!(record.tag, None);
    }

    #[test]
    fn test_tag_beats_range() {
        // "1" is both a tag and a valid range
        let versions = versions(&["1.0.0", "1.5.0"]);
        let tags = vec![VersionRecord::tagged("1", "1.0.0")];

        let record = select_fetch_version("pkg", Some("1"), &versions, &tags).unwrap();
        assert_eq!(record.tag.as_deref(), Some("1"));
        assert_eq!(record.version, "1.0.0");
    }

    #[test]
    fn test_range_picks_highest() {
        let versions = versions(&["1.1.0", "1.2.0", "1.2.5", "2.0.0"]);
        let record = select_fetch_version("pkg", Some("^1.2.0"), &versions, &[]).unwrap();
        assert_eq!(record.version, "1.2.5");
    }

    #[test]
    fn test_empty_request_takes_first_version_then_first_tag() {
        let list = versions(&["3.0.0", "1.0.0"]);
        let tags = vec![VersionRecord::tagged("latest", "1.0.0")];

        assert_eq!(select_fetch_version("pkg", None, &list, &tags).unwrap().version, "3.0.0");
        assert_eq!(select_fetch_version("pkg", Some(""), &list, &tags).unwrap().version, "3.0.0");

        let record = select_fetch_version("pkg", None, &[], &tags).unwrap();
        assert_eq!(record.tag.as_deref(), Some("latest"));
    }

    #[test]
    fn test_duplicates_resolve_last_wins() {
        let list = vec![
            VersionRecord::new("1.0.0").with_url("https://a.example/1.tgz"),
            VersionRecord::new("1.0.0").with_url("https://b.example/1.tgz"),
        ];
        let record = select_fetch_version("pkg", Some("1.0.0"), &list, &[]).unwrap();
        assert_eq!(record.url.as_deref(), Some("https://b.example/1.tgz"));
    }

    #[test]
    fn test_no_match_reason() {
        let list = versions(&["1.0.0", "1.1.0"]);
        let tags = vec![VersionRecord::tagged("latest", "1.1.0")];

        let err = select_fetch_version("pkg", Some("9.9.9"), &list, &tags).unwrap_err();
        assert_eq!(
            err.reason,
            "No matched version for pkg@9.9.9, candidates = 1.0.0, 1.1.0, tags = latest"
        );
        assert_eq!(err.requested.as_deref(), Some("9.9.9"));
        assert_eq!(err.candidate_versions, vec!["1.0.0", "1.1.0"]);
        assert_eq!(err.candidate_tags, vec!["latest"]);
        assert_eq!(err.to_string(), err.reason);
    }

    #[test]
    fn test_no_match_with_nothing_offered() {
        let err = select_fetch_version("pkg", None, &[], &[]).unwrap_err();
        assert_eq!(err.reason, "No matched version for pkg, candidates = n/a, tags = n/a");
        assert_eq!(err.requested, None);
    }
}
