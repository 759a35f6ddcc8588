//! `gbp-fl`: index the files inside Gentoo Build Publisher binary packages,
//! then search and list them.

mod cli;
mod commands;

use crate::cli::Cli;
use crate::commands::App;
use clap::Parser;
use gbpfl_config::Settings;
use miette::{IntoDiagnostic, Result};
use std::process::ExitCode;
use time::UtcOffset;
use tracing_subscriber::EnvFilter;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    // Has to happen while the process is still single-threaded.
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build().into_diagnostic()?;
    let status = runtime.block_on(run(cli, offset))?;
    Ok(ExitCode::from(status))
}

async fn run(cli: Cli, offset: UtcOffset) -> Result<u8> {
    let settings = Settings::load(cli.config.as_deref()).map_err(|err| miette::miette!("{err:?}"))?;
    let app = App::open(&settings, offset).await?;
    app.run(cli.command, &mut std::io::stdout().lock(), &mut std::io::stderr().lock()).await
}
