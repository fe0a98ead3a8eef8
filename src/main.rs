use anyhow::Result;
use clap::Parser;
use nfkit::cli::{Cli, Commands};
use nfkit::infra::logging;

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose, cli.quiet, cli.no_color);

    // Build a context once, pass everywhere
    let ctx = cli.context();

    match cli.command {
        Commands::Process(args) => nfkit::process_run(args, &ctx),
        Commands::Inspect(args) => nfkit::inspect_run(args, &ctx),
        Commands::Key(args) => nfkit::cli_ext::key_run(args, &ctx),
        Commands::Init(args) => nfkit::infra::config::init(args, &ctx),
        Commands::Completions(args) => nfkit::completion::run(args, &ctx),
    }
}
