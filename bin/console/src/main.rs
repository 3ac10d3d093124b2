//! Command-line client for the registrar console.

mod commands;
mod config;
mod error;

use clap::{Args, Parser, Subcommand};
use registrar_listing::Resource;
use registrar_session::{FileStorage, SessionStore};
use registrar_transport::Transport;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{Console, ListRequest};
use crate::config::ConsoleConfig;
use crate::error::ConsoleError;

#[derive(Debug, Parser)]
#[command(name = "registrar-console", version, about = "Student-records administration console")]
struct Cli {
    /// Configuration file (TOML). Defaults to ./registrar.toml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in and remember the session.
    Login { username: String, password: String },
    /// Sign out and forget the session.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Print one page of a collection as JSON lines.
    List(ListArgs),
}

#[derive(Debug, Args)]
struct ListArgs {
    /// academies, majors, subjects, teachers, students, payments or scores.
    resource: String,
    /// Page number, starting at 1.
    #[arg(long, default_value_t = 1)]
    page: usize,
    /// Rows per page.
    #[arg(long, default_value_t = registrar_listing::query::DEFAULT_PAGE_SIZE)]
    size: usize,
    /// Field to sort by.
    #[arg(long)]
    sort: Option<String>,
    /// Sort descending.
    #[arg(long)]
    desc: bool,
    /// Search keyword; search results ignore the sort.
    #[arg(long)]
    keyword: Option<String>,
}

impl ListArgs {
    fn into_request(self) -> Result<ListRequest, ConsoleError> {
        let resource: Resource =
            self.resource
                .parse()
                .map_err(|_| ConsoleError::UnknownResource {
                    name: self.resource.clone(),
                })?;
        let mut request = ListRequest::new(resource);
        request.page = self.page;
        request.size = self.size;
        request.sort = self.sort;
        request.descending = self.desc;
        request.keyword = self.keyword;
        Ok(request)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            tracing::error!("{report}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> registrar_core::Result<(), ConsoleError> {
    let config = ConsoleConfig::load(cli.config.as_deref()).map_err(|e| ConsoleError::Config {
        details: e.to_string(),
    })?;
    tracing::debug!(base_url = config.transport.base_url(), "loaded configuration");

    let storage = FileStorage::new(config.storage.directory.clone());
    let session = SessionStore::open(Arc::new(storage)).await;
    let transport =
        Transport::new(&config.transport, session).map_err(|e| ConsoleError::Transport {
            details: e.to_string(),
        })?;

    let mut console = Console::new(transport, &config.routes);
    let mut out = std::io::stdout();
    match cli.command {
        Command::Login { username, password } => {
            console.login(&username, &password, &mut out).await?;
        }
        Command::Logout => console.logout(&mut out).await?,
        Command::Whoami => console.whoami(&mut out)?,
        Command::List(args) => {
            let request = args.into_request()?;
            console.list(&request, &mut out).await?;
        }
    }
    Ok(())
}
