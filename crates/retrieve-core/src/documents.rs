//! Source document discovery for batch ingestion.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A text file picked up for ingestion.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Path relative to the scan root without its extension, `/`-separated.
    /// Chunk ids are derived from it.
    pub document_id: String,
    pub path: PathBuf,
    pub filename: String,
    /// Parent directory relative to the scan root, `misc` at the top level.
    pub category: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct DocumentScanner {
    extensions: Vec<String>,
    limit: Option<usize>,
}

impl Default for DocumentScanner {
    fn default() -> Self {
        Self { extensions: vec!["txt".to_string(), "md".to_string()], limit: None }
    }
}

impl DocumentScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = exts.into_iter().map(Into::into).collect();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Read every matching file under `root` in path order. A single file
    /// path is accepted as well.
    pub fn scan(&self, root: &Path) -> Result<Vec<SourceDocument>> {
        let mut files = self.list_files(root);
        if files.is_empty() {
            info!("No matching files found under {}", root.display());
            return Ok(vec![]);
        }
        if let Some(limit) = self.limit {
            if files.len() > limit {
                files.truncate(limit);
                info!("Limited to first {} files", limit);
            }
        }
        let base = if root.is_file() { root.parent().unwrap_or(root) } else { root };

        let mut docs = Vec::with_capacity(files.len());
        for path in files {
            debug!("Reading {}", path.display());
            let text = read_lossy(&path)?;
            let Some(document_id) = document_id_of(&path, base) else { continue };
            docs.push(SourceDocument {
                document_id,
                filename: path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default(),
                category: category_of(&path, base),
                path,
                text,
            });
        }
        Ok(docs)
    }

    fn list_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| self.matches(p))
            .collect();
        files.sort();
        files
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

fn read_lossy(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(path)?).to_string()),
    }
}

fn document_id_of(path: &Path, base: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).unwrap_or(path).with_extension("");
    let parts: Vec<String> = relative.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

fn category_of(path: &Path, base: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    match relative.parent().and_then(|p| p.to_str()) {
        Some(parent) if !parent.is_empty() => parent.to_string(),
        _ => "misc".to_string(),
    }
}
