use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
}

impl AppContext {
    /// Apply `style` unless `--no-color` is set.
    pub fn paint<F>(&self, text: &str, style: F) -> String
    where
        F: FnOnce(&str) -> String,
    {
        if self.no_color { text.to_string() } else { style(text) }
    }
}

#[derive(Parser)]
#[command(name = "nfk")]
#[command(about = "Batch rewriting of Brazilian fiscal XML (NFe, CTe, cancellations, inutilizações)")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Compute and report everything without touching the filesystem
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn context(&self) -> AppContext {
        AppContext { quiet: self.quiet, no_color: self.no_color, dry_run: self.dry_run }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rename and rewrite a directory of documents with a profile
    Process(ProcessArgs),

    /// Classify documents and show proposed names without changing anything
    Inspect(InspectArgs),

    /// Compute (43 digits) or verify (44 digits) an access-key check digit
    Key(KeyArgs),

    /// Initialize an nfk.toml config file and an example profile
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ProcessArgs {
    /// Directory containing the XML batch
    pub dir: PathBuf,

    /// Profile id (`<profiles-dir>/<id>.toml`)
    #[arg(short, long)]
    pub profile: String,

    /// Override the configured profiles directory
    #[arg(long)]
    pub profiles_dir: Option<PathBuf>,

    /// Copy the batch here and process the copies, leaving DIR untouched
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Worker threads (default: config `jobs`, then available parallelism)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Print the batch report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InspectFormat {
    Text,
    Json,
    Table,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Directory containing the XML batch
    pub dir: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: InspectFormat,
}

#[derive(Args, Debug, Clone)]
pub struct KeyArgs {
    /// 43-digit body or 44-digit key; non-digits are ignored
    pub digits: String,
}

#[derive(Args, Debug, Clone)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing files
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; required unless --stdout is set
    #[arg(long, conflicts_with = "stdout")]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
