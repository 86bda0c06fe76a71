//! Sass-style import resolution.
//!
//! An id is probed against one base directory at a time: explicit
//! `.scss`/`.sass`/`.css` ids are tried as-is and as a partial, bare ids are
//! tried with each extension, as-is and as a partial. Exactly one readable
//! candidate must exist.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImport {
    pub file: PathBuf,
    pub contents: Arc<str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(ResolvedImport),
    /// More than one candidate exists.
    Ambiguous(Vec<PathBuf>),
    /// Nothing exists, but the id names a plain `.css` file that the
    /// browser can load itself.
    PassThrough,
    NotFound,
}

/// Resolves an import id against a single base directory.
pub trait ImportResolver: Send + Sync + fmt::Debug {
    fn resolve(&self, id: &str, cwd: &Path) -> Resolution;
}

type Probe = Arc<OnceCell<Option<Arc<str>>>>;

/// Process-wide memo of file probes. Concurrent probes of one path share a
/// single read.
#[derive(Debug, Default)]
pub struct ImportCache {
    entries: Mutex<HashMap<PathBuf, Probe>>,
    reads: AtomicUsize,
}

impl ImportCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of `path`, or `None` if it is missing or unreadable.
    pub fn load(&self, path: &Path) -> Option<Arc<str>> {
        let probe = {
            let mut entries = self
                .entries
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            entries.entry(path.to_path_buf()).or_default().clone()
        };
        probe
            .get_or_init(|| {
                self.reads.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(path = %path.display(), "Probing import candidate");
                fs::read_to_string(path).ok().map(Arc::from)
            })
            .clone()
    }

    /// How many distinct filesystem reads were made.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SassImportResolver {
    cache: Arc<ImportCache>,
}

impl SassImportResolver {
    pub fn new(cache: Arc<ImportCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<ImportCache> {
        &self.cache
    }
}

impl ImportResolver for SassImportResolver {
    fn resolve(&self, id: &str, cwd: &Path) -> Resolution {
        let file = if id.starts_with('/') {
            PathBuf::from(id)
        } else {
            cwd.join(id)
        };
        let Some(base) = file.file_name().and_then(|name| name.to_str()) else {
            return Resolution::NotFound;
        };
        let dir = file.parent().unwrap_or_else(|| Path::new(""));
        let partial = base.starts_with('_');

        let mut candidates = Vec::new();
        if has_sass_extension(base) || has_css_extension(base) {
            candidates.push(file.clone());
            if !partial {
                candidates.push(dir.join(format!("_{base}")));
            }
        } else {
            for ext in ["scss", "sass", "css"] {
                candidates.push(dir.join(format!("{base}.{ext}")));
            }
            if !partial {
                for ext in ["scss", "sass", "css"] {
                    candidates.push(dir.join(format!("_{base}.{ext}")));
                }
            }
        }

        let mut found: Vec<ResolvedImport> = candidates
            .into_iter()
            .filter_map(|candidate| {
                self.cache.load(&candidate).map(|contents| ResolvedImport {
                    file: candidate,
                    contents,
                })
            })
            .collect();

        match found.len() {
            1 => Resolution::Found(found.remove(0)),
            0 if has_css_extension(base) => Resolution::PassThrough,
            0 => Resolution::NotFound,
            _ => Resolution::Ambiguous(found.into_iter().map(|import| import.file).collect()),
        }
    }
}

fn has_sass_extension(base: &str) -> bool {
    let lower = base.to_ascii_lowercase();
    lower.ends_with(".scss") || lower.ends_with(".sass")
}

fn has_css_extension(base: &str) -> bool {
    base.to_ascii_lowercase().ends_with(".css")
}

static PROTOCOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[A-Za-z]+:)?//").expect("valid protocol regex"));

pub type ImportFilterCallback = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Decides which `@import` ids are inlined. Ids that are not inlined are
/// left in the output untouched.
#[derive(Clone, Default)]
pub enum ImportFilter {
    /// Inline everything except URLs with a protocol (`//` or `scheme://`).
    #[default]
    Default,
    /// Inline ids matching the pattern.
    Pattern(Regex),
    /// Inline when the callback, given the id and media, returns true.
    Callback(ImportFilterCallback),
}

impl ImportFilter {
    pub fn accepts(&self, id: &str, media: &str) -> bool {
        match self {
            Self::Default => !PROTOCOL.is_match(id),
            Self::Pattern(pattern) => pattern.is_match(id),
            Self::Callback(callback) => callback(id, media),
        }
    }
}

impl fmt::Debug for ImportFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Pattern(pattern) => f.debug_tuple("Pattern").field(&pattern.as_str()).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for ImportFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pattern = String::deserialize(deserializer)?;
        Regex::new(&pattern)
            .map(Self::Pattern)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/imports")
    }

    fn resolver() -> SassImportResolver {
        SassImportResolver::new(Arc::new(ImportCache::new()))
    }

    fn found_file(resolution: Resolution) -> PathBuf {
        match resolution {
            Resolution::Found(import) => import.file,
            other => panic!("expected a resolved import, got {other:?}"),
        }
    }

    #[test]
    fn resolves_partials_without_underscore_or_extension() {
        let file = found_file(resolver().resolve("partial", &fixture_dir()));
        assert_eq!(file, fixture_dir().join("_partial.scss"));
    }

    #[test]
    fn resolves_explicit_extension() {
        let file = found_file(resolver().resolve("plain.css", &fixture_dir()));
        assert_eq!(file, fixture_dir().join("plain.css"));
    }

    #[test]
    fn both_partial_and_full_name_is_ambiguous() {
        match resolver().resolve("foo", &fixture_dir()) {
            Resolution::Ambiguous(files) => assert_eq!(files.len(), 2),
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn missing_css_passes_through() {
        let resolver = resolver();
        assert_eq!(
            resolver.resolve("missing.css", &fixture_dir()),
            Resolution::PassThrough
        );
        assert_eq!(
            resolver.resolve("missing", &fixture_dir()),
            Resolution::NotFound
        );
    }

    #[test]
    fn cache_reads_each_path_once() {
        let resolver = resolver();
        resolver.resolve("partial", &fixture_dir());
        let first = resolver.cache().reads();
        resolver.resolve("partial", &fixture_dir());
        assert_eq!(resolver.cache().reads(), first);
        assert_eq!(first, 6);
    }

    #[test]
    fn cache_is_shared_across_threads() {
        let cache = Arc::new(ImportCache::new());
        let path = fixture_dir().join("_partial.scss");
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let path = path.clone();
                std::thread::spawn(move || cache.load(&path).is_some())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().expect("probe thread"));
        }
        assert_eq!(cache.reads(), 1);
    }

    #[test]
    fn default_filter_skips_protocols() {
        let filter = ImportFilter::default();
        assert!(!filter.accepts("https://example.com/a.css", ""));
        assert!(!filter.accepts("//cdn/a.css", ""));
        assert!(filter.accepts("partial", "screen"));

        let filter = ImportFilter::Pattern(Regex::new("^theme/").expect("regex"));
        assert!(filter.accepts("theme/dark", ""));
        assert!(!filter.accepts("partial", ""));
    }
}
