//! Asset directory scanning.
//!
//! Walks a directory tree and loads every matching file as a [`Document`].
//! Document ids are paths relative to the scanned root, so a file at the
//! top level keeps its bare filename. Results are sorted by id.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::AssetsConfig;
use docbase_core::models::Document;

/// Directories skipped regardless of configuration.
const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

/// Scan the configured `assets.root`.
pub fn scan_assets(config: &AssetsConfig) -> Result<Vec<Document>> {
    let root = config
        .root
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("assets.root is not configured"))?;
    scan_dir(root, config)
}

/// Scan `root` using the include/exclude rules from `config`.
pub fn scan_dir(root: &Path, config: &AssetsConfig) -> Result<Vec<Document>> {
    if !root.is_dir() {
        bail!("Asset directory does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;
    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut documents = Vec::new();
    for entry in WalkDir::new(root).follow_links(config.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read asset: {}", path.display()))?;
        debug!(file = %rel_str, bytes = bytes.len(), "loaded asset");
        documents.push(Document::new(rel_str, bytes));
    }

    documents.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(documents)
}

/// Load a single file; its id is the file name.
pub fn read_document(path: &Path) -> Result<Document> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Document::new(name, bytes))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbase_core::models::DocumentFormat;
    use std::fs;

    fn layout() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("guides")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("readme.md"), "# Readme").unwrap();
        fs::write(root.join("guides/setup.txt"), "setup steps").unwrap();
        fs::write(root.join("guides/data.json"), "{}").unwrap();
        fs::write(root.join("image.png"), [0x89, 0x50, 0x4e, 0x47]).unwrap();
        fs::write(root.join(".git/HEAD.md"), "ref").unwrap();
        fs::write(root.join("node_modules/pkg/index.md"), "dep").unwrap();
        dir
    }

    #[test]
    fn test_scan_sorted_and_filtered() {
        let dir = layout();
        let docs = scan_dir(dir.path(), &AssetsConfig::default()).unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["guides/data.json", "guides/setup.txt", "readme.md"]);
        assert_eq!(docs[0].format, DocumentFormat::StructuredData);
        assert_eq!(docs[2].bytes, b"# Readme");
    }

    #[test]
    fn test_custom_excludes() {
        let dir = layout();
        let config = AssetsConfig {
            exclude_globs: vec!["guides/**".to_string()],
            ..AssetsConfig::default()
        };
        let docs = scan_dir(dir.path(), &config).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "readme.md");
    }

    #[test]
    fn test_scan_assets_requires_root() {
        assert!(scan_assets(&AssetsConfig::default()).is_err());
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = scan_dir(&dir.path().join("nope"), &AssetsConfig::default()).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_read_document_uses_file_name() {
        let dir = layout();
        let doc = read_document(&dir.path().join("guides/setup.txt")).unwrap();
        assert_eq!(doc.id, "setup.txt");
        assert_eq!(doc.format, DocumentFormat::PlainText);
    }
}
