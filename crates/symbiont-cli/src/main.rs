//! Symbiont CLI binary entrypoint.

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use symbiont_cli::cli::{Cli, Commands};
use symbiont_cli::commands::{
    BountyCommand, CheckCommand, PurchaseCommand, QueryCommand, SellerCommand, UploadCommand, VoteCommand,
};
use symbiont_cli::context::open_market;
use symbiont_cli::output::OutputFormat;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("symbiont=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let market = open_market(cli)
        .with_context(|| format!("failed to open marketplace at {}", cli.data_dir.display()))?;
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();

    match &cli.command {
        Commands::Query(args) => QueryCommand::new(&market).execute(&mut stdout, &format, args)?,
        Commands::Check { id } => CheckCommand::new(&market).execute(&mut stdout, &format, id)?,
        Commands::Purchase(args) => PurchaseCommand::new(&market).execute(&mut stdout, &format, args)?,
        Commands::Vote(args) => VoteCommand::new(&market).execute(&mut stdout, &format, args)?,
        Commands::Upload(args) => UploadCommand::new(&market).execute(&mut stdout, &format, args)?,
        Commands::Bounty { command } => BountyCommand::new(&market).execute(&mut stdout, &format, command)?,
        Commands::Seller { command } => SellerCommand::new(&market).execute(&mut stdout, &format, command)?,
    }

    Ok(())
}
