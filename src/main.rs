use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use medora::accounts::{self, NewUser};
use medora::api::{self, types::issue_token};
use medora::config::{self, Settings};
use medora::core_state::CoreState;
use medora::db;
use medora::models::Role;

/// Medora healthcare administration portal
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Settings file (TOML). Defaults to ./medora.toml when present.
    #[arg(long, global = true, env = "MEDORA_CONFIG")]
    config: Option<PathBuf>,

    /// Database file, overriding the settings file.
    #[arg(long, global = true, env = "MEDORA_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API until Ctrl-C
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Apply pending migrations and print the schema version
    Migrate,
    /// Create a user (and its role profile); prints the new id
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, value_parser = parse_role)]
        role: Role,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
    },
    /// Issue a bearer token for a user; the token is printed once
    IssueToken {
        #[arg(long)]
        user: Uuid,
    },
}

fn parse_role(raw: &str) -> Result<Role, String> {
    raw.parse::<Role>().map_err(|_| {
        let names: Vec<&str> = Role::ALL.iter().map(Role::as_str).collect();
        format!("expected one of: {}", names.join(", "))
    })
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut settings = match Settings::load(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(path) = cli.db {
        settings.database.path = path;
    }
    medora::init_tracing(Some(&settings.log.filter));

    match run(cli.command, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, mut settings: Settings) -> CliResult {
    if let Some(parent) = settings.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let core = Arc::new(CoreState::new(settings.database.path.clone()));

    match command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            serve(core, &settings.bind_addr()).await
        }
        Command::Migrate => {
            let conn = core.open_db()?;
            println!("Schema version {}", db::get_current_version(&conn));
            Ok(())
        }
        Command::CreateUser {
            username,
            email,
            role,
            first_name,
            last_name,
        } => {
            let conn = core.open_db()?;
            let user = accounts::create_user(
                &conn,
                NewUser {
                    username,
                    email,
                    role,
                    first_name,
                    last_name,
                    phone: None,
                    date_of_birth: None,
                    address: None,
                },
            )?;
            println!("{}", user.id);
            Ok(())
        }
        Command::IssueToken { user } => {
            let conn = core.open_db()?;
            let user = accounts::get_user(&conn, &user)?;
            if !user.is_active {
                return Err(format!("user {} is inactive", user.username).into());
            }
            println!("{}", issue_token(&conn, &user.id)?);
            Ok(())
        }
    }
}

async fn serve(core: Arc<CoreState>, addr: &str) -> CliResult {
    // Migrate up front so a broken database fails before binding.
    core.open_db()?;
    tracing::info!("{} v{} starting", config::APP_NAME, config::APP_VERSION);
    let server = api::start_server(core, addr).await?;
    println!("Listening on http://{}", server.addr);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Ctrl-C received, shutting down");
    server.stop().await;
    Ok(())
}
