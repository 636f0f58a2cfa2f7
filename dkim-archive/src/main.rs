use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dkim_archive::{
    persistence::sql::{Migrator, SqlDb},
    AppContext, ConfigToml, DkimArchiveServer,
};

#[derive(Parser, Debug)]
#[clap(version, about)]
struct Cli {
    /// Path to the TOML config file. Defaults apply when omitted.
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// [tracing_subscriber::EnvFilter], overrides RUST_LOG and the config.
    #[clap(short, long)]
    tracing_env_filter: Option<String>,
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Default)]
enum Command {
    /// Serve the batch update endpoint until Ctrl-C.
    #[default]
    Serve,
    /// Apply pending database migrations and exit.
    Migrate,
}

fn read_config(path: Option<&PathBuf>) -> Result<ConfigToml> {
    match path {
        Some(path) => Ok(ConfigToml::from_file(path)?),
        None => Ok(ConfigToml::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let config = read_config(args.config.as_ref())?;
    dkim_archive::tracing::init_tracing_logs(&config.logging, args.tracing_env_filter.as_deref())?;

    match args.command.unwrap_or_default() {
        Command::Migrate => {
            let db = SqlDb::connect(&config.general.database_url).await?;
            Migrator::new(&db).run().await?;
            tracing::info!("Database is up to date");
        }
        Command::Serve => {
            let context = AppContext::read_from(config).await?;
            let server = DkimArchiveServer::start(&context).await?;
            tracing::info!(
                "DKIM archive running on http://{}, press Ctrl-C to stop",
                server.listen_socket()
            );
            tokio::signal::ctrl_c().await?;
            tracing::info!("Shutting down");
            drop(server);
        }
    }

    Ok(())
}
