use std::path::Path;
use walkdir::WalkDir;

use crate::Result;

/// Copy the tree under `source` into `dest`, returning the number of files copied.
///
/// Symlinks and special files are skipped.
pub fn mirror_directory(source: &Path, dest: &Path) -> Result<u64> {
    std::fs::create_dir_all(dest)?;
    let mut copied = 0;

    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        let relative = path.strip_prefix(source).unwrap_or(path);
        let target = dest.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(path, &target)?;
            copied += 1;
        } else {
            log::debug!("Skipping {} while mirroring", path.display());
        }
    }

    Ok(copied)
}

/// Remove `dir` and everything in it, then recreate it empty
pub fn reset_directory(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}
