//! Path normalization, root-relative addressing, and literal-include
//! resolution.
//!
//! All store paths are kept in canonical relative form: forward slashes,
//! no `.`/`..` segments, no duplicate separators. The literal-include
//! resolver probes the same candidate locations the PHP runtime would
//! for a string-literal `require`, with `__DIR__` standing in for the
//! including file's directory.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::ConfigError;
use crate::FileProvider;

#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            root: PathBuf::from(normalize(&root.to_string_lossy())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical store-relative form of `path`. Paths outside the root
    /// keep their absolute form (vendor trees symlinked elsewhere stay
    /// addressable).
    pub fn relative_to_root(&self, path: &Path) -> String {
        let normalized = PathBuf::from(normalize(&path.to_string_lossy()));
        match pathdiff::diff_paths(&normalized, &self.root) {
            Some(rel) if !rel.to_string_lossy().starts_with("..") => {
                normalize(&rel.to_string_lossy())
            }
            _ => normalize(&normalized.to_string_lossy()),
        }
    }

    /// Absolute form of a store path.
    pub fn absolute_of(&self, stored: &str) -> PathBuf {
        if stored.starts_with('/') {
            PathBuf::from(normalize(stored))
        } else {
            PathBuf::from(normalize(
                &self.root.join(stored).to_string_lossy(),
            ))
        }
    }

    /// Resolve the literal context of a require/include edge against the
    /// file system. `source_rel` is the including file's store path.
    ///
    /// Probe order: the including file's directory, the same directory
    /// re-rooted, the project root, then the working directory. First
    /// existing candidate wins.
    pub fn resolve_literal_include(
        &self,
        fs: &dyn FileProvider,
        context: &str,
        source_rel: &str,
    ) -> Option<PathBuf> {
        let source_dir = Path::new(source_rel)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let source_dir_abs = self.absolute_of(&source_dir);

        if context.contains("__DIR__") {
            let substituted = context.replace("__DIR__", &source_dir_abs.to_string_lossy());
            let candidate = PathBuf::from(normalize(&substituted));
            return fs.exists(&candidate).then_some(candidate);
        }

        if context.starts_with('/') {
            let candidate = PathBuf::from(normalize(context));
            return fs.exists(&candidate).then_some(candidate);
        }

        let mut candidates = vec![
            source_dir_abs.join(context),
            self.root.join(&source_dir).join(context),
            self.root.join(context),
        ];
        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join(context));
        }

        let mut seen = Vec::new();
        for candidate in candidates {
            let candidate = PathBuf::from(normalize(&candidate.to_string_lossy()));
            if seen.contains(&candidate) {
                continue;
            }
            if fs.exists(&candidate) {
                return Some(candidate);
            }
            seen.push(candidate);
        }
        None
    }
}

/// Logical canonicalization: backslashes become forward slashes,
/// duplicate separators collapse, `.` disappears, `..` pops. The
/// absolute/relative nature of the input is preserved; no file system
/// access happens here.
pub fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let is_absolute = path.starts_with('/');

    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !is_absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if is_absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Join path fragments and canonicalize the result.
pub fn join(parts: &[&str]) -> String {
    normalize(&parts.join("/"))
}

/// Basename of a store path.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Compile glob patterns (`*`, `**`, `?`, `{a,b}`) into one matcher.
/// Used only by the ingest pre-scanner; the resolver never globs.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| ConfigError::BadPattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| ConfigError::BadPattern {
        pattern: patterns.join(","),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryFileProvider;

    #[test]
    fn normalize_collapses_segments() {
        assert_eq!(normalize("a//b/./c"), "a/b/c");
        assert_eq!(normalize("a/b/../c"), "a/c");
        assert_eq!(normalize("/x/./y//z/.."), "/x/y");
        assert_eq!(normalize("..\\up\\file.php"), "../up/file.php");
        assert_eq!(normalize("/"), "/");
    }

    #[test]
    fn join_canonicalizes() {
        assert_eq!(join(&["src", "./sub", "file.php"]), "src/sub/file.php");
        assert_eq!(join(&["/root", "a/..", "b.php"]), "/root/b.php");
    }

    #[test]
    fn relative_to_root_prefers_relative_form() {
        let paths = PathResolver::new("/project");
        assert_eq!(
            paths.relative_to_root(Path::new("/project/src/App.php")),
            "src/App.php"
        );
        assert_eq!(
            paths.relative_to_root(Path::new("/elsewhere/lib.php")),
            "/elsewhere/lib.php"
        );
    }

    #[test]
    fn magic_dir_resolves_next_to_source() {
        let fs = InMemoryFileProvider::new();
        fs.add_file("/root/a/x.php", "<?php\n");
        let paths = PathResolver::new("/root");

        let hit = paths.resolve_literal_include(&fs, "__DIR__ . missing", "a/b.php");
        assert!(hit.is_none());

        let hit = paths.resolve_literal_include(&fs, "__DIR__/x.php", "a/b.php");
        assert_eq!(hit, Some(PathBuf::from("/root/a/x.php")));
    }

    #[test]
    fn relative_context_probes_source_dir_then_root() {
        let fs = InMemoryFileProvider::new();
        fs.add_file("/root/lib/helper.php", "<?php\n");
        fs.add_file("/root/shared.php", "<?php\n");
        let paths = PathResolver::new("/root");

        assert_eq!(
            paths.resolve_literal_include(&fs, "helper.php", "lib/main.php"),
            Some(PathBuf::from("/root/lib/helper.php"))
        );
        assert_eq!(
            paths.resolve_literal_include(&fs, "shared.php", "lib/main.php"),
            Some(PathBuf::from("/root/shared.php"))
        );
    }

    #[test]
    fn globset_supports_braces_and_double_star() {
        let set = build_globset(&[
            "src/**/*.php".to_string(),
            "app/{models,views}/*.php".to_string(),
        ])
        .unwrap();
        assert!(set.is_match("src/deep/nested/File.php"));
        assert!(set.is_match("app/models/User.php"));
        assert!(!set.is_match("tests/FileTest.php"));
    }
}
