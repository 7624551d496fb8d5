use anyhow::{bail, Result};
use sift_core::error::StoreError;
use sift_core::{DocId, DocMeta, DocumentStore, RawDocument};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Files under a directory, numbered from 0 in file-name order and read lazily.
pub struct FsDocumentStore {
    root: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
}

impl FsDocumentStore {
    /// Collect the files under `input` (or `input` itself if it is a file).
    /// With `extensions` set, only files with one of those extensions are kept.
    pub fn discover(input: &Path, extensions: Option<&[String]>) -> Result<Self> {
        let wanted = |p: &Path| match extensions {
            None => true,
            Some(exts) => p
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| exts.iter().any(|e| e.eq_ignore_ascii_case(ext))),
        };

        let mut files = Vec::new();
        if input.is_dir() {
            for entry in WalkDir::new(input).sort_by_file_name() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping unreadable directory entry");
                        continue;
                    }
                };
                if entry.file_type().is_file() && wanted(entry.path()) {
                    files.push(entry.into_path());
                }
            }
            Ok(Self { root: input.to_path_buf(), files, next: 0 })
        } else if input.is_file() {
            files.push(input.to_path_buf());
            let root = input.parent().map(Path::to_path_buf).unwrap_or_default();
            Ok(Self { root, files, next: 0 })
        } else {
            bail!("input path {} does not exist", input.display());
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Id → path (relative to the input root) for every discovered file.
    pub fn doc_meta(&self) -> HashMap<DocId, DocMeta> {
        self.files
            .iter()
            .enumerate()
            .map(|(id, path)| {
                let rel = path.strip_prefix(&self.root).unwrap_or(path);
                (id as DocId, DocMeta { path: rel.to_string_lossy().into_owned() })
            })
            .collect()
    }
}

impl DocumentStore for FsDocumentStore {
    fn next_document(&mut self) -> Result<Option<RawDocument>, StoreError> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        let id = self.next as DocId;
        self.next += 1;
        let content = fs::read(path).map_err(|e| format!("reading {}: {e}", path.display()))?;
        Ok(Some(RawDocument { id, content }))
    }
}
