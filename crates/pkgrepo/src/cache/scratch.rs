use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Hands out scratch directory paths next to a cached file.
///
/// Names combine a timestamp, the process id and a counter, so two calls in
/// the same process never collide even within one clock tick.
#[derive(Debug, Default)]
pub struct ScratchAllocator {
    sequence: AtomicU64,
}

impl ScratchAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh, not yet created, sibling directory of `file`
    pub fn allocate(&self, file: &Path) -> PathBuf {
        let parent = file.parent().unwrap_or_else(|| Path::new("."));
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);

        parent.join(format!("{}-{}-{}", nanos, std::process::id(), seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_allocate_is_sibling() {
        let scratch = ScratchAllocator::new();
        let dir = scratch.allocate(Path::new("/cache/component/registry/abc.tgz"));
        assert_eq!(dir.parent(), Some(Path::new("/cache/component/registry")));
    }

    #[test]
    fn test_allocate_is_unique() {
        let scratch = ScratchAllocator::new();
        let file = Path::new("/cache/a.tgz");
        let dirs: HashSet<_> = (0..1000).map(|_| scratch.allocate(file)).collect();
        assert_eq!(dirs.len(), 1000);
    }
}
