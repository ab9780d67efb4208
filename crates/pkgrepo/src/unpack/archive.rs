//! Archive extraction (zip, tar, tar.gz, tar.bz2, tar.xz).

use flate2::read::GzDecoder;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use crate::{RepositoryError, Result};

/// Supported archive types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    Zip,
    Tar,
    TarGz,
    TarBz2,
    TarXz,
}

impl ArchiveType {
    /// Detect archive type from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let path_str = path.to_string_lossy().to_lowercase();

        if path_str.ends_with(".zip") {
            Some(ArchiveType::Zip)
        } else if path_str.ends_with(".tar.gz") || path_str.ends_with(".tgz") {
            Some(ArchiveType::TarGz)
        } else if path_str.ends_with(".tar.bz2") || path_str.ends_with(".tbz2") {
            Some(ArchiveType::TarBz2)
        } else if path_str.ends_with(".tar.xz") || path_str.ends_with(".txz") {
            Some(ArchiveType::TarXz)
        } else if path_str.ends_with(".tar") {
            Some(ArchiveType::Tar)
        } else {
            None
        }
    }

    /// Detect archive type from the leading bytes of a file
    pub fn from_magic(header: &[u8]) -> Option<Self> {
        if header.starts_with(&[0x1f, 0x8b]) {
            Some(ArchiveType::TarGz)
        } else if header.starts_with(b"PK\x03\x04") || header.starts_with(b"PK\x05\x06") {
            Some(ArchiveType::Zip)
        } else if header.starts_with(b"BZh") {
            Some(ArchiveType::TarBz2)
        } else if header.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            Some(ArchiveType::TarXz)
        } else if header.len() >= 262 && &header[257..262] == b"ustar" {
            Some(ArchiveType::Tar)
        } else {
            None
        }
    }

    /// Extension first, then the file contents
    pub fn detect(path: &Path) -> Result<Option<Self>> {
        if let Some(kind) = Self::from_path(path) {
            return Ok(Some(kind));
        }

        let mut header = Vec::with_capacity(512);
        File::open(path)?.take(512).read_to_end(&mut header)?;
        Ok(Self::from_magic(&header))
    }
}

fn failed(archive_path: &Path, reason: impl ToString) -> RepositoryError {
    RepositoryError::Decompress {
        file: archive_path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Relative path made only of normal components, or `None` if it could escape
fn sanitize(path: &Path) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(clean)
}

/// Shared top-level directory of a set of entry paths.
///
/// Returns `None` when any file sits at the top level or the entries do not
/// agree on their first component.
fn common_root<I>(entries: I) -> Option<OsString>
where
    I: IntoIterator<Item = (PathBuf, bool)>,
{
    let mut root: Option<OsString> = None;
    let mut nested = false;

    for (path, is_dir) in entries {
        let mut components = path.components().filter(|c| !matches!(c, Component::CurDir));
        let first = match components.next() {
            Some(Component::Normal(first)) => first.to_os_string(),
            Some(_) => return None,
            None => continue,
        };
        let has_more = components.next().is_some();
        if !has_more && !is_dir {
            return None;
        }
        nested |= has_more;

        match &root {
            Some(existing) if *existing != first => return None,
            Some(_) => {}
            None => root = Some(first),
        }
    }

    if nested {
        root
    } else {
        None
    }
}

fn strip_root(path: &Path, root: Option<&OsString>) -> PathBuf {
    match root {
        Some(root) => path.strip_prefix(root).unwrap_or(path).to_path_buf(),
        None => path.to_path_buf(),
    }
}

/// Archive extractor
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    /// Extract an archive to the specified directory
    pub fn extract(archive_path: &Path, dest_dir: &Path) -> Result<()> {
        let archive_type = ArchiveType::detect(archive_path)?.ok_or_else(|| {
            failed(archive_path, "unknown archive type")
        })?;

        Self::extract_with_type(archive_path, dest_dir, archive_type)
    }

    /// Extract an archive with explicit type
    pub fn extract_with_type(archive_path: &Path, dest_dir: &Path, archive_type: ArchiveType) -> Result<()> {
        std::fs::create_dir_all(dest_dir)?;

        match archive_type {
            ArchiveType::Zip => Self::extract_zip(archive_path, dest_dir),
            tarball => Self::extract_tar(archive_path, dest_dir, tarball),
        }
    }

    fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<()> {
        let file = File::open(archive_path)?;
        let mut archive = zip::ZipArchive::new(BufReader::new(file))
            .map_err(|e| failed(archive_path, format!("failed to open zip: {}", e)))?;

        let root = common_root((0..archive.len()).filter_map(|i| {
            let name = archive.name_for_index(i)?;
            Some((PathBuf::from(name), name.ends_with('/')))
        }));

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| failed(archive_path, format!("failed to read zip entry: {}", e)))?;

            let name = entry.name().to_string();
            let relative = sanitize(&strip_root(Path::new(&name), root.as_ref()))
                .ok_or_else(|| failed(archive_path, format!("path traversal detected: {}", name)))?;
            if relative.as_os_str().is_empty() {
                continue;
            }

            let outpath = dest_dir.join(&relative);
            if entry.is_dir() {
                std::fs::create_dir_all(&outpath)?;
                continue;
            }

            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&outpath)?;
            std::io::copy(&mut entry, &mut outfile)?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))?;
                }
            }
        }

        Ok(())
    }

    fn open_tar(archive_path: &Path, archive_type: ArchiveType) -> Result<tar::Archive<Box<dyn Read>>> {
        let reader = BufReader::new(File::open(archive_path)?);
        let decoded: Box<dyn Read> = match archive_type {
            ArchiveType::TarGz => Box::new(GzDecoder::new(reader)),
            ArchiveType::TarBz2 => Box::new(bzip2::read::BzDecoder::new(reader)),
            ArchiveType::TarXz => Box::new(xz2::read::XzDecoder::new(reader)),
            _ => Box::new(reader),
        };
        Ok(tar::Archive::new(decoded))
    }

    fn is_metadata_entry(entry_type: tar::EntryType) -> bool {
        matches!(
            entry_type,
            tar::EntryType::XGlobalHeader | tar::EntryType::XHeader
        )
    }

    /// Scan the entry list once to find a shared top-level directory
    fn tar_common_root(archive_path: &Path, archive_type: ArchiveType) -> Result<Option<OsString>> {
        let mut archive = Self::open_tar(archive_path, archive_type)?;
        let mut paths = Vec::new();

        for entry in archive
            .entries()
            .map_err(|e| failed(archive_path, format!("failed to read tar: {}", e)))?
        {
            let entry = entry.map_err(|e| failed(archive_path, format!("failed to read tar entry: {}", e)))?;
            let entry_type = entry.header().entry_type();
            if Self::is_metadata_entry(entry_type) {
                continue;
            }
            let path = entry
                .path()
                .map_err(|e| failed(archive_path, format!("invalid path in tar: {}", e)))?
                .into_owned();
            paths.push((path, entry_type.is_dir()));
        }

        if paths.is_empty() {
            return Err(failed(archive_path, "archive is empty"));
        }

        Ok(common_root(paths))
    }

    fn extract_tar(archive_path: &Path, dest_dir: &Path, archive_type: ArchiveType) -> Result<()> {
        let root = Self::tar_common_root(archive_path, archive_type)?;
        let mut archive = Self::open_tar(archive_path, archive_type)?;

        for entry in archive
            .entries()
            .map_err(|e| failed(archive_path, format!("failed to read tar: {}", e)))?
        {
            let mut entry = entry.map_err(|e| failed(archive_path, format!("failed to read tar entry: {}", e)))?;
            let entry_type = entry.header().entry_type();
            if Self::is_metadata_entry(entry_type) {
                continue;
            }

            let path = entry
                .path()
                .map_err(|e| failed(archive_path, format!("invalid path in tar: {}", e)))?
                .into_owned();
            let relative = sanitize(&strip_root(&path, root.as_ref())).ok_or_else(|| {
                failed(archive_path, format!("path traversal detected: {}", path.display()))
            })?;
            if relative.as_os_str().is_empty() {
                continue;
            }

            let outpath = dest_dir.join(&relative);
            if entry_type.is_dir() {
                std::fs::create_dir_all(&outpath)?;
                continue;
            }

            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent)?;
            }
            entry
                .unpack(&outpath)
                .map_err(|e| failed(archive_path, format!("failed to extract {}: {}", relative.display(), e)))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_tgz(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, body) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, body.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_archive_type_from_path() {
        assert_eq!(ArchiveType::from_path(Path::new("package.zip")), Some(ArchiveType::Zip));
        assert_eq!(ArchiveType::from_path(Path::new("package.tar.gz")), Some(ArchiveType::TarGz));
        assert_eq!(ArchiveType::from_path(Path::new("package.tgz")), Some(ArchiveType::TarGz));
        assert_eq!(ArchiveType::from_path(Path::new("package.tar.bz2")), Some(ArchiveType::TarBz2));
        assert_eq!(ArchiveType::from_path(Path::new("package.tar.xz")), Some(ArchiveType::TarXz));
        assert_eq!(ArchiveType::from_path(Path::new("package.tar")), Some(ArchiveType::Tar));
        assert_eq!(ArchiveType::from_path(Path::new("package.txt")), None);
    }

    #[test]
    fn test_archive_type_from_magic() {
        assert_eq!(ArchiveType::from_magic(&[0x1f, 0x8b, 0x08]), Some(ArchiveType::TarGz));
        assert_eq!(ArchiveType::from_magic(b"PK\x03\x04rest"), Some(ArchiveType::Zip));
        assert_eq!(ArchiveType::from_magic(b"BZh91AY"), Some(ArchiveType::TarBz2));
        assert_eq!(ArchiveType::from_magic(b"plain text"), None);
    }

    #[test]
    fn test_common_root() {
        let paths = |items: &[(&str, bool)]| {
            items
                .iter()
                .map(|(p, d)| (PathBuf::from(p), *d))
                .collect::<Vec<_>>()
        };

        assert_eq!(
            common_root(paths(&[("package/", true), ("package/index.js", false)])),
            Some(OsString::from("package"))
        );
        assert_eq!(common_root(paths(&[("package/a.js", false), ("other/b.js", false)])), None);
        assert_eq!(common_root(paths(&[("package/a.js", false), ("README", false)])), None);
        assert_eq!(common_root(paths(&[("lib/", true)])), None);
    }

    #[test]
    fn test_sanitize_rejects_traversal() {
        assert_eq!(sanitize(Path::new("./a/b.js")), Some(PathBuf::from("a/b.js")));
        assert_eq!(sanitize(Path::new("a/../../etc/passwd")), None);
        assert_eq!(sanitize(Path::new("/etc/passwd")), None);
        assert_eq!(sanitize(Path::new("a..b/c")), Some(PathBuf::from("a..b/c")));
    }

    #[test]
    fn test_extract_tgz_strips_package_dir() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("pkg.tgz");
        write_tgz(
            &archive,
            &[("package/package.json", "{\"name\":\"pkg\"}"), ("package/lib/index.js", "1")],
        );

        let dest = dir.path().join("out");
        ArchiveExtractor::extract(&archive, &dest).unwrap();

        assert!(dest.join("package.json").is_file());
        assert!(dest.join("lib/index.js").is_file());
        assert!(!dest.join("package").exists());
    }

    #[test]
    fn test_extract_tgz_without_common_root() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("flat.tar.gz");
        write_tgz(&archive, &[("index.js", "1"), ("lib/util.js", "2")]);

        let dest = dir.path().join("out");
        ArchiveExtractor::extract(&archive, &dest).unwrap();

        assert!(dest.join("index.js").is_file());
        assert!(dest.join("lib/util.js").is_file());
    }

    #[test]
    fn test_extract_sniffs_type_without_extension() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("download");
        write_tgz(&archive, &[("package/index.js", "1")]);

        let dest = dir.path().join("out");
        ArchiveExtractor::extract(&archive, &dest).unwrap();
        assert!(dest.join("index.js").is_file());
    }

    #[test]
    fn test_extract_zip() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("pkg.zip");
        {
            let mut writer = zip::ZipWriter::new(File::create(&archive).unwrap());
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file("widget-1.0/readme.md", options).unwrap();
            writer.write_all(b"# widget").unwrap();
            writer.start_file("widget-1.0/src/lib.js", options).unwrap();
            writer.write_all(b"1").unwrap();
            writer.finish().unwrap();
        }

        let dest = dir.path().join("out");
        ArchiveExtractor::extract(&archive, &dest).unwrap();

        assert_eq!(std::fs::read_to_string(dest.join("readme.md")).unwrap(), "# widget");
        assert!(dest.join("src/lib.js").is_file());
    }

    #[test]
    fn test_extract_garbage_is_decompress_error() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("broken.tgz");
        std::fs::write(&archive, b"definitely not gzip").unwrap();

        let err = ArchiveExtractor::extract(&archive, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, RepositoryError::Decompress { ref file, .. } if file == &archive));
    }

    #[test]
    fn test_extract_unknown_type() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, b"hello").unwrap();

        let err = ArchiveExtractor::extract(&file, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, RepositoryError::Decompress { .. }));
    }
}
