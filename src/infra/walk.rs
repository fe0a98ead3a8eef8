//! Batch discovery: the XML documents sitting directly in an input directory.
//!
//! A batch is one flat directory. Extra ignore globs from `nfk.toml` are
//! matched against the file name. Version-control ignore files are not
//! consulted; an invoice listed in some unrelated `.gitignore` is still part
//! of the batch.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{DirEntry, WalkBuilder};

/// File extension (case-insensitive) of batch documents.
pub const XML_EXTENSION: &str = "xml";

/// Flat, deterministic lister for a batch directory.
pub struct FileWalker
{
    skip: GlobSet,
}

impl FileWalker
{
    /// Compile the configured ignore globs (e.g. `"*.orig.xml"`).
    pub fn new(ignore_globs: &[String]) -> Result<Self>
    {
        let mut set = GlobSetBuilder::new();
        for raw in ignore_globs
        {
            let glob = Glob::new(raw).with_context(|| format!("Invalid ignore pattern {raw:?}"))?;
            set.add(glob);
        }

        Ok(Self {
            skip: set
                .build()
                .context("Failed to compile ignore patterns")?,
        })
    }

    fn keep(
        &self,
        entry: &DirEntry,
    ) -> bool
    {
        let is_file = entry
            .file_type()
            .is_some_and(|ft| ft.is_file());
        is_file && is_xml(entry.path()) && !self.skip.is_match(entry.file_name())
    }

    /// The batch: non-hidden `*.xml` files (any case) under `root`, sorted.
    pub fn xml_files<P: AsRef<Path>>(
        &self,
        root: P,
    ) -> Vec<PathBuf>
    {
        let mut found: Vec<PathBuf> = WalkBuilder::new(root.as_ref())
            .standard_filters(false)
            .hidden(true)
            .follow_links(false)
            .max_depth(Some(1))
            .build()
            .filter_map(Result::ok)
            .filter(|entry| self.keep(entry))
            .map(DirEntry::into_path)
            .collect();

        found.sort();
        found
    }
}

pub fn is_xml(path: &Path) -> bool
{
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(XML_EXTENSION))
}
