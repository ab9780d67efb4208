//! Small helpers shared by the repositories and collaborators.

use std::path::{Component, Path, PathBuf};

use md5::{Digest, Md5};
use sha1::Sha1;

/// Archive extensions made of two parts; checked before the plain extension.
const COMPOUND_EXTENSIONS: &[&str] = &[".tar.gz", ".tar.bz2", ".tar.xz"];

/// Infer the file extension (with its leading dot) from a URL or path.
///
/// Query strings and fragments are ignored. Returns an empty string when the
/// last path segment has no extension.
///
/// ```
/// use pkgrepo::util::file_ext_name;
///
/// assert_eq!(file_ext_name("https://example.com/foo-1.0.0.tgz"), ".tgz");
/// assert_eq!(file_ext_name("https://example.com/foo.tar.gz?token=1"), ".tar.gz");
/// assert_eq!(file_ext_name("/tmp/archive.zip"), ".zip");
/// assert_eq!(file_ext_name("https://example.com/download"), "");
/// ```
pub fn file_ext_name(url: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(parsed) if parsed.has_host() => parsed.path().to_string(),
        _ => url.to_string(),
    };

    let segment = path.rsplit(['/', '\\']).next().unwrap_or_default();
    let lower = segment.to_lowercase();

    if let Some(ext) = COMPOUND_EXTENSIONS.iter().find(|ext| lower.ends_with(*ext)) {
        return ext.to_string();
    }

    match Path::new(segment).extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy()),
        None => String::new(),
    }
}

/// Derive a package name from the last path segment of a URL, dropping any
/// archive extension.
pub fn name_from_url(url: &str) -> String {
    let ext = file_ext_name(url);
    let path = match url::Url::parse(url) {
        Ok(parsed) if parsed.has_host() => parsed.path().to_string(),
        _ => url.to_string(),
    };

    let segment = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();

    segment
        .strip_suffix(ext.as_str())
        .unwrap_or(segment)
        .to_string()
}

/// Hex md5 of a string
pub fn md5_hex(text: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hex sha1 of a string
pub fn sha1_hex(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Resolve `path` against `base` without touching the filesystem.
///
/// `.` segments are dropped and `..` pops the previous segment, so the result
/// is the same whether or not the target exists yet.
pub fn resolve_path(base: &Path, path: &str) -> PathBuf {
    let joined = base.join(path);
    let mut resolved = PathBuf::new();

    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other.as_os_str()),
        }
    }

    resolved
}
