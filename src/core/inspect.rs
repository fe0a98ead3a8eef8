//! Read-only view of a batch: what each file is and what it would be named.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use rayon::prelude::*;
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::cli::{AppContext, InspectArgs, InspectFormat};
use crate::core::classify::{ClassifiedDocument, classify};
use crate::core::rename::{cancellation_name, invoice_numbers_by_key, suggest_name};
use crate::fiscal::cfop::MovementTables;
use crate::fiscal::key::verify;
use crate::infra::config::load_config;
use crate::infra::io::read_bytes;
use crate::infra::walk::FileWalker;
use crate::markup::codec::XmlCodec;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub path: PathBuf,
    /// Document kind, `unknown`, or `malformed`
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    /// Check digit of `access_key` is valid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentSummary {
    fn bare(path: &Path, kind: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            kind: kind.to_string(),
            number: None,
            movement_code: None,
            access_key: None,
            key_valid: None,
            proposed_name: None,
            error: None,
        }
    }
}

/// Classify `files` and attach the names the renamer would pick.
pub fn summarize(files: &[PathBuf], codec: &XmlCodec, tables: &MovementTables) -> Vec<DocumentSummary> {
    let parsed: Vec<Result<Option<ClassifiedDocument>, String>> = files
        .par_iter()
        .map(|path| {
            let bytes = read_bytes(path).map_err(|e| e.to_string())?;
            let tree = codec
                .parse(&bytes)
                .map_err(|e| e.to_string())?;
            Ok(classify(tree, path))
        })
        .collect();

    let numbers = invoice_numbers_by_key(
        parsed
            .iter()
            .filter_map(|r| r.as_ref().ok()?.as_ref()),
    );

    files
        .iter()
        .zip(&parsed)
        .map(|(path, res)| match res {
            Err(e) => DocumentSummary { error: Some(e.clone()), ..DocumentSummary::bare(path, "malformed") },
            Ok(None) => DocumentSummary::bare(path, "unknown"),
            Ok(Some(doc)) => {
                let key = doc
                    .access_key
                    .clone()
                    .or_else(|| doc.canceled_key.clone());
                DocumentSummary {
                    number: doc.invoice_number.clone(),
                    movement_code: doc.movement_code.clone(),
                    key_valid: key.as_deref().map(verify),
                    access_key: key,
                    proposed_name: suggest_name(doc, tables).or_else(|| cancellation_name(doc, &numbers)),
                    ..DocumentSummary::bare(path, doc.kind.label())
                }
            }
        })
        .collect()
}

#[derive(Tabled)]
struct Row {
    file: String,
    kind: String,
    number: String,
    cfop: String,
    key: String,
    proposed: String,
}

fn dash(v: &Option<String>) -> String {
    v.clone()
        .unwrap_or_else(|| "-".to_string())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn run(args: InspectArgs, ctx: &AppContext) -> Result<()> {
    let config = load_config()?;
    if !args.dir.is_dir() {
        anyhow::bail!("Input directory not found: {}", args.dir.display());
    }
    let files = FileWalker::new(&config.ignore_patterns)?.xml_files(&args.dir);
    let summaries = summarize(&files, &XmlCodec::new(), &config.movement);

    match args.format {
        InspectFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summaries).context("Failed to serialize summary")?);
        }
        InspectFormat::Table => {
            let rows: Vec<Row> = summaries
                .iter()
                .map(|s| Row {
                    file: file_name(&s.path),
                    kind: s.kind.clone(),
                    number: dash(&s.number),
                    cfop: dash(&s.movement_code),
                    key: match s.key_valid {
                        Some(true) => ctx.paint("ok", |t| t.green().to_string()),
                        Some(false) => ctx.paint("bad DV", |t| t.red().to_string()),
                        None => "-".to_string(),
                    },
                    proposed: dash(&s.proposed_name),
                })
                .collect();
            println!("{}", Table::new(rows));
        }
        InspectFormat::Text => {
            for s in &summaries {
                let name = file_name(&s.path);
                match (&s.proposed_name, &s.error) {
                    (_, Some(err)) => println!("{} {name}: {err}", ctx.paint("✗", |t| t.red().to_string())),
                    (Some(p), None) if *p != name => println!("{name} [{}] -> {p}", s.kind),
                    _ => println!("{name} [{}]", s.kind),
                }
            }
        }
    }
    Ok(())
}
