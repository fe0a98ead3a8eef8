//! Batch orchestration: extract → rename → map → edit → save.
//!
//! Each phase consumes the previous state, so a batch cannot be edited
//! before every document has been extracted and the key mapping built.
//! Parsing, editing and saving fan out over a bounded rayon pool; renaming
//! and mapping run on the calling thread.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use rayon::prelude::*;
use serde::Serialize;
use tabled::{Table, Tabled};
use tracing::{error, info, instrument, warn};

use crate::cli::{AppContext, ProcessArgs};
use crate::core::classify::{ClassifiedDocument, DocumentKind, classify};
use crate::core::edit::{ChangeLog, EditContext, edit_document};
use crate::core::error::FiscalError;
use crate::core::mapping::{self, KeyMapping, MappingOutcome};
use crate::core::profile::{ConfigurationProfile, ProfileStore, TomlProfileStore};
use crate::core::rename::{RenameRecord, RenameSkip, rename_batch};
use crate::fiscal::cfop::MovementTables;
use crate::fiscal::date::DateStamp;
use crate::infra::config::load_config;
use crate::infra::io::{read_bytes, stage_copies, write_atomic};
use crate::infra::walk::FileWalker;
use crate::markup::codec::XmlCodec;

/// Every input file has been read and classified.
pub struct Extracted;
/// Renames applied (or planned, in dry-run).
pub struct Renamed;
/// Key and reference maps built; read-only from here on.
pub struct Mapped {
    mapping: MappingOutcome,
}
/// Trees edited; `dirty[i]` marks documents that need saving.
pub struct Edited {
    dirty: Vec<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Read,
    Parse,
    Key,
    Edit,
    Save,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub path: PathBuf,
    pub stage: Stage,
    pub kind: &'static str,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditRecord {
    pub path: PathBuf,
    pub kind: DocumentKind,
    pub changes: ChangeLog,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub root: PathBuf,
    pub profile: String,
    pub dry_run: bool,
    pub scanned: usize,
    pub recognized: usize,
    pub renames: Vec<RenameRecord>,
    pub rename_skips: Vec<RenameSkip>,
    pub key_mappings: KeyMapping,
    pub primary_sale_key: Option<String>,
    pub edits: Vec<EditRecord>,
    pub unchanged: Vec<PathBuf>,
    pub saved: usize,
    /// Not a known fiscal document type
    pub skipped: Vec<PathBuf>,
    pub failures: Vec<FailureRecord>,
}

impl BatchReport {
    fn fail(&mut self, path: &Path, stage: Stage, err: &FiscalError) {
        error!(file = %path.display(), stage = ?stage, error = %err, "document failed");
        self.failures.push(FailureRecord {
            path: path.to_path_buf(),
            stage,
            kind: err.kind(),
            detail: err.to_string(),
        });
    }
}

/// Batch-wide, read-only inputs shared by every phase.
pub struct Pipeline {
    codec: XmlCodec,
    profile: ConfigurationProfile,
    tables: MovementTables,
    date_stamp: Option<DateStamp>,
    dry_run: bool,
    pool: rayon::ThreadPool,
    progress: ProgressBar,
}

impl Pipeline {
    /// Fails on an invalid profile date, before any file is touched.
    pub fn new(profile: ConfigurationProfile, tables: MovementTables, jobs: Option<usize>, dry_run: bool) -> Result<Self> {
        let date_stamp = profile
            .date_override()
            .with_context(|| format!("Profile {:?} has an invalid target date", profile.name))?
            .map(DateStamp::now);

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = jobs.filter(|n| *n > 0) {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .context("Failed to build worker pool")?;

        Ok(Self {
            codec: XmlCodec::new(),
            profile,
            tables,
            date_stamp,
            dry_run,
            pool,
            progress: ProgressBar::hidden(),
        })
    }

    /// Replace the batch clock (tests pin it).
    pub fn with_date_stamp(mut self, stamp: Option<DateStamp>) -> Self {
        self.date_stamp = stamp;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn profile(&self) -> &ConfigurationProfile {
        &self.profile
    }

    fn phase(&self, len: usize, msg: &'static str) {
        self.progress
            .set_length(len as u64);
        self.progress.set_position(0);
        self.progress.set_message(msg);
    }

    fn load(&self, path: &Path) -> Result<Option<ClassifiedDocument>, (Stage, FiscalError)> {
        let bytes = read_bytes(path).map_err(|e| (Stage::Read, FiscalError::io(path, e)))?;
        let tree = self
            .codec
            .parse(&bytes)
            .map_err(|e| (Stage::Parse, e.into()))?;
        Ok(classify(tree, path))
    }
}

pub struct Batch<'p, S> {
    pipeline: &'p Pipeline,
    docs: Vec<ClassifiedDocument>,
    report: BatchReport,
    state: S,
}

impl<'p, S> Batch<'p, S> {
    pub fn documents(&self) -> &[ClassifiedDocument] {
        &self.docs
    }

    pub fn report(&self) -> &BatchReport {
        &self.report
    }
}

impl<'p> Batch<'p, Extracted> {
    /// Read, parse and classify `files` in parallel. Malformed files are
    /// reported and left out; unknown document types are skipped.
    #[instrument(skip_all, fields(root = %root.display(), files = files.len()))]
    pub fn extract(root: &Path, files: &[PathBuf], pipeline: &'p Pipeline) -> Self {
        pipeline.phase(files.len(), "parsing");
        let loaded: Vec<_> = pipeline.pool.install(|| {
            files
                .par_iter()
                .map(|path| {
                    let res = pipeline.load(path);
                    pipeline.progress.inc(1);
                    res
                })
                .collect()
        });

        let mut report = BatchReport {
            root: root.to_path_buf(),
            profile: pipeline.profile.name.clone(),
            dry_run: pipeline.dry_run,
            scanned: files.len(),
            ..BatchReport::default()
        };
        let mut docs = Vec::new();
        for (path, res) in files.iter().zip(loaded) {
            match res {
                Ok(Some(doc)) => docs.push(doc),
                Ok(None) => report.skipped.push(path.clone()),
                Err((stage, err)) => report.fail(path, stage, &err),
            }
        }
        report.recognized = docs.len();
        info!(recognized = docs.len(), skipped = report.skipped.len(), "extracted");

        Batch { pipeline, docs, report, state: Extracted }
    }

    pub fn rename(self) -> Batch<'p, Renamed> {
        let Batch { pipeline, mut docs, mut report, .. } = self;
        let outcome = rename_batch(&mut docs, &pipeline.tables, pipeline.dry_run);
        report.renames = outcome.renamed;
        report.rename_skips = outcome.skipped;
        Batch { pipeline, docs, report, state: Renamed }
    }
}

impl<'p> Batch<'p, Renamed> {
    pub fn map(self) -> Batch<'p, Mapped> {
        let Batch { pipeline, docs, mut report, .. } = self;
        let mapping = mapping::build(&docs, &pipeline.profile, pipeline.date_stamp.as_ref());
        for failure in &mapping.failures {
            report.fail(&failure.path, Stage::Key, &FiscalError::InvalidKey(failure.error.clone()));
        }
        report.key_mappings = mapping.keys.clone();
        report.primary_sale_key = mapping
            .primary_sale_key
            .clone();
        info!(keys = mapping.keys.len(), references = mapping.references.len(), "mapping built");
        Batch { pipeline, docs, report, state: Mapped { mapping } }
    }
}

impl<'p> Batch<'p, Mapped> {
    pub fn mapping(&self) -> &MappingOutcome {
        &self.state.mapping
    }

    /// Run the per-type editors in parallel. Documents whose key could not
    /// be derived are not edited.
    pub fn edit(self) -> Batch<'p, Edited> {
        let Batch { pipeline, mut docs, mut report, state: Mapped { mapping } } = self;
        let ctx = EditContext::new(&pipeline.profile, pipeline.date_stamp, &mapping, &pipeline.tables);

        pipeline.phase(docs.len(), "editing");
        let results: Vec<Option<Result<ChangeLog, FiscalError>>> = pipeline.pool.install(|| {
            docs.par_iter_mut()
                .map(|doc| {
                    let res = match mapping.failed(&doc.path) {
                        Some(_) => None,
                        None => Some(edit_document(doc, &ctx)),
                    };
                    pipeline.progress.inc(1);
                    res
                })
                .collect()
        });

        let mut dirty = vec![false; docs.len()];
        for (i, res) in results.into_iter().enumerate() {
            let doc = &docs[i];
            match res {
                None => {}
                Some(Ok(log)) if log.is_empty() => report.unchanged.push(doc.path.clone()),
                Some(Ok(log)) => {
                    info!(file = %doc.file_name(), changes = log.len(), "edited");
                    dirty[i] = true;
                    report.edits.push(EditRecord { path: doc.path.clone(), kind: doc.kind, changes: log });
                }
                Some(Err(err)) => report.fail(&doc.path, Stage::Edit, &err),
            }
        }

        Batch { pipeline, docs, report, state: Edited { dirty } }
    }
}

impl<'p> Batch<'p, Edited> {
    /// Serialize and atomically write every changed document. In dry-run
    /// mode nothing is written.
    pub fn save(self) -> BatchReport {
        let Batch { pipeline, docs, mut report, state: Edited { dirty } } = self;
        let targets: Vec<&ClassifiedDocument> = docs
            .iter()
            .zip(&dirty)
            .filter_map(|(d, dirty)| dirty.then_some(d))
            .collect();

        if pipeline.dry_run {
            pipeline.progress.finish_and_clear();
            return report;
        }

        pipeline.phase(targets.len(), "saving");
        let results: Vec<Result<(), FiscalError>> = pipeline.pool.install(|| {
            targets
                .par_iter()
                .map(|doc| {
                    let text = pipeline.codec.serialize(&doc.tree);
                    let res = write_atomic(&doc.path, text.as_bytes()).map_err(|e| FiscalError::io(&doc.path, e));
                    pipeline.progress.inc(1);
                    res
                })
                .collect()
        });
        pipeline.progress.finish_and_clear();

        for (doc, res) in targets.iter().zip(results) {
            match res {
                Ok(()) => report.saved += 1,
                Err(err) => report.fail(&doc.path, Stage::Save, &err),
            }
        }
        report
    }
}

/// Run the whole pipeline over `files`.
pub fn process_files(root: &Path, files: &[PathBuf], pipeline: &Pipeline) -> BatchReport {
    Batch::extract(root, files, pipeline)
        .rename()
        .map()
        .edit()
        .save()
}

fn progress_bar(ctx: &AppContext) -> ProgressBar {
    if ctx.quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

pub fn run(args: ProcessArgs, ctx: &AppContext) -> Result<()> {
    let config = load_config()?;
    if !args.dir.is_dir() {
        anyhow::bail!("Input directory not found: {}", args.dir.display());
    }

    let profiles_dir = args
        .profiles_dir
        .clone()
        .unwrap_or_else(|| config.profiles_dir());
    let profile = TomlProfileStore::new(profiles_dir)
        .get_profile(&args.profile)
        .with_context(|| format!("Cannot load profile {:?}", args.profile))?;

    let jobs = args.jobs.or(config.jobs);
    let pipeline = Pipeline::new(profile, config.movement.clone(), jobs, ctx.dry_run)?.with_progress(progress_bar(ctx));

    let walker = FileWalker::new(&config.ignore_patterns)?;
    let inputs = walker.xml_files(&args.dir);
    if inputs.is_empty() {
        warn!(dir = %args.dir.display(), "no XML files found");
    }

    let (root, files) = match &args.output {
        Some(out) if !ctx.dry_run => (out.clone(), stage_copies(&inputs, out)?),
        Some(out) => (out.clone(), inputs),
        None => (args.dir.clone(), inputs),
    };

    let report = process_files(&root, &files, &pipeline);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report).context("Failed to serialize report")?);
    } else if !ctx.quiet {
        print_summary(&report, ctx);
    }
    Ok(())
}

#[derive(Tabled)]
struct EditRow {
    file: String,
    kind: String,
    changes: usize,
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_summary(report: &BatchReport, ctx: &AppContext) {
    if report.dry_run {
        println!("{}", ctx.paint("DRY RUN: nothing was written", |s| s.yellow().to_string()));
    }
    for r in &report.renames {
        println!("  {} {} -> {}", ctx.paint("↻", |s| s.cyan().to_string()), display_name(&r.from), display_name(&r.to));
    }
    for skip in &report.rename_skips {
        println!("  {} {} kept ({})", ctx.paint("!", |s| s.yellow().to_string()), display_name(&skip.path), skip.reason);
    }

    if !report.edits.is_empty() {
        let rows: Vec<EditRow> = report
            .edits
            .iter()
            .map(|e| EditRow { file: display_name(&e.path), kind: e.kind.to_string(), changes: e.changes.len() })
            .collect();
        println!("{}", Table::new(rows));
    }

    for f in &report.failures {
        println!("  {} {} [{}] {}", ctx.paint("✗", |s| s.red().to_string()), display_name(&f.path), f.kind, f.detail);
    }

    let mark = if report.failures.is_empty() {
        ctx.paint("✓", |s| s.green().to_string())
    } else {
        ctx.paint("!", |s| s.yellow().to_string())
    };
    println!(
        "{mark} {} scanned, {} recognized, {} renamed, {} edited, {} saved, {} skipped, {} failed",
        report.scanned,
        report.recognized,
        report.renames.len(),
        report.edits.len(),
        report.saved,
        report.skipped.len(),
        report.failures.len(),
    );
}
