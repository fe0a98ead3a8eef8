//! `nfk completions`: shell completion scripts from the clap definition.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::CommandFactory;
use clap_complete::Shell as Target;
use tracing::info;

use crate::cli::{AppContext, Cli, CompletionsArgs, Shell};

const BIN_NAME: &str = "nfk";

fn target(shell: &Shell) -> Target {
    match shell {
        Shell::Bash => Target::Bash,
        Shell::Zsh => Target::Zsh,
        Shell::Fish => Target::Fish,
        Shell::PowerShell => Target::PowerShell,
        Shell::Elvish => Target::Elvish,
    }
}

/// Write the script for `shell` into `dir`, returning the file written.
pub fn write_script(shell: &Shell, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    clap_complete::generate_to(target(shell), &mut Cli::command(), BIN_NAME, dir)
        .with_context(|| format!("Failed to write completion script into {}", dir.display()))
}

pub fn run(args: CompletionsArgs, ctx: &AppContext) -> Result<()> {
    if args.stdout {
        clap_complete::generate(target(&args.shell), &mut Cli::command(), BIN_NAME, &mut std::io::stdout());
        return Ok(());
    }

    let Some(dir) = args.out_dir else {
        bail!("--out-dir is required unless --stdout is set");
    };

    if ctx.dry_run {
        if !ctx.quiet {
            eprintln!("Would write {} completion into {}", target(&args.shell), dir.display());
        }
        return Ok(());
    }

    let path = write_script(&args.shell, &dir)?;
    info!(path = %path.display(), "completion script written");
    if !ctx.quiet {
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_land_in_the_requested_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("completions");
        let path = write_script(&Shell::Bash, &dir).unwrap();
        assert!(path.starts_with(&dir));
        let script = std::fs::read_to_string(path).unwrap();
        assert!(script.contains("nfk"));
    }
}
