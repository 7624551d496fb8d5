//! On-disk layout of a saved index.
//!
//! ```text
//! meta.json                                   MetaFile, names the live generation
//! docs.bin                                    DocId -> DocMeta, owned by the front ends
//! gen-{generation:06}/dictionary.bin          sorted terms; a term's id is its position
//! gen-{generation:06}/universe.bin            PostingList of every indexed id
//! gen-{generation:06}/postings/{term_id:08}.postings.bin
//! ```
//!
//! A save writes a complete new generation directory and only then swaps
//! `meta.json` (write to a temporary file, then rename). Until that rename the
//! previous generation stays the live one, so a failed save never leaves a
//! half-written index behind. Older generations are removed afterwards.
//!
//! Posting lists are validated on load, so a file that is not strictly
//! increasing is rejected instead of producing a corrupt index.

use crate::error::PersistError;
use crate::index::InvertedIndex;
use crate::posting::PostingList;
use crate::tokenizer::TokenizerConfig;
use crate::{DocId, DocMeta, TermId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: u32,
    pub created_at: String,
    pub version: u32,
    /// Generation directory holding the data files.
    #[serde(default)]
    pub generation: u64,
    /// Rules the index was built with; queries must be tokenized the same way.
    #[serde(default)]
    pub tokenizer: TokenizerConfig,
}

impl MetaFile {
    /// Metadata describing `index` as of now.
    pub fn for_index(index: &InvertedIndex, tokenizer: TokenizerConfig) -> Self {
        let created_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        Self {
            num_docs: index.num_docs() as u32,
            num_terms: index.num_terms() as u32,
            created_at,
            version: FORMAT_VERSION,
            generation: 0,
            tokenizer,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn docs(&self) -> PathBuf { self.root.join("docs.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    fn generation(&self, generation: u64) -> PathBuf { self.root.join(format!("gen-{generation:06}")) }
    fn dictionary(&self, generation: u64) -> PathBuf { self.generation(generation).join("dictionary.bin") }
    fn universe(&self, generation: u64) -> PathBuf { self.generation(generation).join("universe.bin") }
    fn postings_dir(&self, generation: u64) -> PathBuf { self.generation(generation).join("postings") }
    fn postings_for(&self, generation: u64, term_id: TermId) -> PathBuf {
        self.postings_dir(generation).join(format!("{term_id:08}.postings.bin"))
    }

    /// Generation numbers of every `gen-*` directory under the root.
    fn generations(&self) -> Result<Vec<u64>, PersistError> {
        let mut found = Vec::new();
        if !self.root.exists() {
            return Ok(found);
        }
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(generation) = name.to_str().and_then(|n| n.strip_prefix("gen-")).and_then(|n| n.parse().ok()) {
                found.push(generation);
            }
        }
        found.sort_unstable();
        Ok(found)
    }
}

fn write_bincode<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistError> {
    let mut f = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut f, value)?;
    f.flush()?;
    Ok(())
}

/// Replace `path` with `bytes` in one rename.
fn replace_file(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    let tmp = path.with_extension("tmp");
    let mut f = File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn read_bincode<T: DeserializeOwned>(path: &Path) -> Result<T, PersistError> {
    let f = BufReader::new(File::open(path)?);
    Ok(bincode::deserialize_from(f)?)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<(), PersistError> {
    create_dir_all(&paths.root)?;
    let json = serde_json::to_string_pretty(meta)?;
    replace_file(&paths.meta(), json.as_bytes())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile, PersistError> {
    let f = BufReader::new(File::open(paths.meta())?);
    let meta: MetaFile = serde_json::from_reader(f)?;
    if meta.version > FORMAT_VERSION {
        return Err(PersistError::UnsupportedVersion { found: meta.version, supported: FORMAT_VERSION });
    }
    Ok(meta)
}

pub fn save_docs(paths: &IndexPaths, docs: &HashMap<DocId, DocMeta>) -> Result<(), PersistError> {
    create_dir_all(&paths.root)?;
    replace_file(&paths.docs(), &bincode::serialize(docs)?)
}

pub fn load_docs(paths: &IndexPaths) -> Result<HashMap<DocId, DocMeta>, PersistError> {
    read_bincode(&paths.docs())
}

pub fn load_dictionary(paths: &IndexPaths, meta: &MetaFile) -> Result<Vec<String>, PersistError> {
    read_bincode(&paths.dictionary(meta.generation))
}

pub fn load_postings_for_term(
    paths: &IndexPaths,
    meta: &MetaFile,
    term_id: TermId,
) -> Result<PostingList, PersistError> {
    read_bincode(&paths.postings_for(meta.generation, term_id))
}

/// Write `index` as a new generation under `paths.root` and make it live.
///
/// The posting lists and universe come from one [`InvertedIndex::snapshot`],
/// so concurrent writers never leave a half-updated document on disk. The
/// counts in `meta` are taken from that snapshot as well.
pub fn save_index(paths: &IndexPaths, index: &InvertedIndex, meta: &MetaFile) -> Result<(), PersistError> {
    create_dir_all(&paths.root)?;
    let previous = paths.generations()?;
    let generation = previous.last().map_or(1, |g| g + 1);
    let postings_dir = paths.postings_dir(generation);
    create_dir_all(&postings_dir)?;

    let (postings, universe) = index.snapshot();
    let written = write_generation(paths, generation, &postings, &universe);
    if let Err(e) = written {
        if let Err(cleanup) = std::fs::remove_dir_all(paths.generation(generation)) {
            tracing::warn!(generation, error = %cleanup, "could not remove partial generation");
        }
        return Err(e);
    }

    let meta = MetaFile {
        num_docs: universe.len() as u32,
        num_terms: postings.len() as u32,
        generation,
        ..meta.clone()
    };
    save_meta(paths, &meta)?;

    for old in previous {
        if let Err(error) = std::fs::remove_dir_all(paths.generation(old)) {
            tracing::warn!(generation = old, %error, "could not remove old generation");
        }
    }
    tracing::info!(root = %paths.root.display(), generation, terms = postings.len(), "saved index");
    Ok(())
}

fn write_generation(
    paths: &IndexPaths,
    generation: u64,
    postings: &[(String, PostingList)],
    universe: &PostingList,
) -> Result<(), PersistError> {
    let mut dictionary: Vec<&str> = Vec::with_capacity(postings.len());
    for (term_id, (term, list)) in postings.iter().enumerate() {
        write_bincode(&paths.postings_for(generation, term_id as TermId), list)?;
        dictionary.push(term);
    }
    write_bincode(&paths.dictionary(generation), &dictionary)?;
    write_bincode(&paths.universe(generation), universe)
}

/// Load an index saved by [`save_index`] together with its metadata.
pub fn load_index(paths: &IndexPaths) -> Result<(InvertedIndex, MetaFile), PersistError> {
    let meta = load_meta(paths)?;
    let dictionary = load_dictionary(paths, &meta)?;
    let universe: PostingList = read_bincode(&paths.universe(meta.generation))?;
    let mut postings = Vec::with_capacity(dictionary.len());
    for (term_id, term) in dictionary.into_iter().enumerate() {
        let term_id = term_id as TermId;
        let list = match load_postings_for_term(paths, &meta, term_id) {
            Err(PersistError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistError::MissingPostings { term, term_id });
            }
            other => other?,
        };
        postings.push((term, list));
    }
    let index = InvertedIndex::from_postings(postings, universe);
    tracing::info!(root = %paths.root.display(), docs = index.num_docs(), terms = index.num_terms(), "loaded index");
    Ok((index, meta))
}
