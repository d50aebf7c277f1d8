use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use taskhive::auth::TokenGenerator;
use taskhive::config::ServerConfig;
use taskhive::server::{AppState, create_router};
use taskhive::store::{SqliteStore, Store};
use taskhive::types::{Token, User};

const ADMIN_TOKEN_FILE: &str = ".admin_token";

#[derive(Parser)]
#[command(name = "taskhive", about = "A group task server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,

        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Create the database and mint the admin token
    Init {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("taskhive=info".parse()?))
        .init();

    match Cli::parse().command {
        Commands::Admin {
            command:
                AdminCommands::Init {
                    data_dir,
                    non_interactive,
                },
        } => run_init(data_dir, non_interactive),
        Commands::Serve {
            host,
            port,
            data_dir,
        } => {
            run_serve(ServerConfig {
                host,
                port,
                data_dir,
            })
            .await
        }
    }
}

fn mint_token(
    generator: &TokenGenerator,
    is_admin: bool,
    user_id: Option<String>,
) -> anyhow::Result<(Token, String)> {
    let (raw_token, lookup, hash) = generator.generate()?;
    let token = Token {
        id: Uuid::new_v4().to_string(),
        token_hash: hash,
        token_lookup: lookup,
        is_admin,
        user_id,
        created_at: Utc::now(),
        expires_at: None,
        last_used_at: None,
    };
    Ok((token, raw_token))
}

fn run_init(data_dir: PathBuf, non_interactive: bool) -> anyhow::Result<()> {
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;

    let store = SqliteStore::new(data_dir.join("taskhive.db"))?;
    store.initialize()?;

    let token_file = data_dir.join(ADMIN_TOKEN_FILE);
    if store.has_admin_token()? {
        bail!(
            "Server already initialized. Admin token exists at: {}",
            token_file.display()
        );
    }

    let generator = TokenGenerator::new();
    let (token, raw_token) = mint_token(&generator, true, None)?;
    store.create_token(&token)?;

    fs::write(&token_file, &raw_token)?;
    restrict_permissions(&token_file);

    print_token_banner("Admin token (save this, it won't be shown again):", &raw_token);
    println!("Token also written to: {}\n", token_file.display());

    if !non_interactive {
        maybe_create_first_user(&store, &generator)?;
    }

    Ok(())
}

async fn run_serve(config: ServerConfig) -> anyhow::Result<()> {
    let token_file = config.data_dir.join(ADMIN_TOKEN_FILE);
    if !token_file.exists() {
        bail!("Server not initialized. Run 'taskhive admin init' first.");
    }

    let store = SqliteStore::new(config.db_path())?;
    if !store.has_admin_token()? {
        bail!("Server not initialized. Run 'taskhive admin init' first.");
    }

    let state = Arc::new(AppState::new(Arc::new(store)));
    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!("Admin token available at {}", token_file.display());
    info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn maybe_create_first_user(store: &SqliteStore, generator: &TokenGenerator) -> anyhow::Result<()> {
    let wanted = inquire::Confirm::new("Would you like to create a default user?")
        .with_default(false)
        .prompt()?;
    if !wanted {
        return Ok(());
    }

    let name = inquire::Text::new("Display name:")
        .with_validator(|input: &str| {
            if input.trim().is_empty() {
                Err("Display name cannot be empty".into())
            } else {
                Ok(inquire::validator::Validation::Valid)
            }
        })
        .prompt()?;

    let user = User {
        id: Uuid::new_v4().to_string(),
        name: name.clone(),
        avatar_url: None,
        created_at: Utc::now(),
    };
    store.create_user(&user)?;

    let (token, raw_token) = mint_token(generator, false, Some(user.id.clone()))?;
    store.create_token(&token)?;

    print_token_banner(&format!("Created user '{name}' with token:"), &raw_token);

    Ok(())
}

fn print_token_banner(heading: &str, raw_token: &str) {
    println!();
    println!("========================================");
    println!("{heading}");
    println!();
    println!("  {raw_token}");
    println!();
    println!("========================================");
    println!();
}

#[cfg(unix)]
fn restrict_permissions(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("failed to set permissions on {}: {e}", path.display());
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &std::path::Path) {}
