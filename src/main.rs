use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cheis::auth::{hash_password, rotate_signup_key};
use cheis::config::ServerConfig;
use cheis::server::validation::{normalize_email, validate_email};
use cheis::server::{AppState, create_router};
use cheis::store::{SqliteStore, Store};
use cheis::types::{NewUser, Role};

const NOT_INITIALIZED: &str =
    "Server not initialized. Run 'cheis admin init' first to create the database and an administrator.";

#[derive(Parser)]
#[command(name = "cheis")]
#[command(about = "A citation and sample data registry", long_about = None)]
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
        /// TOML config file; flags below override its values
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Public base URL for external access (e.g., "https://isotopes.example.org").
        /// Used for generating signup links. If not set, links are relative.
        #[arg(long)]
        public_base_url: Option<String>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database, administrator and signup key)
    Init {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Administrator name
        #[arg(long)]
        name: Option<String>,

        /// Administrator email
        #[arg(long)]
        email: Option<String>,

        /// Administrator password
        #[arg(long)]
        password: Option<String>,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },
}

struct AdminDetails {
    name: String,
    email: String,
    password: String,
}

fn prompt_admin(
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
) -> anyhow::Result<AdminDetails> {
    let name = match name {
        Some(name) => name,
        None => inquire::Text::new("Name:")
            .with_validator(|input: &str| {
                if input.trim().is_empty() {
                    Ok(inquire::validator::Validation::Invalid(
                        "Name cannot be empty".into(),
                    ))
                } else {
                    Ok(inquire::validator::Validation::Valid)
                }
            })
            .prompt()?,
    };

    let email = match email {
        Some(email) => email,
        None => inquire::Text::new("Email:")
            .with_validator(|input: &str| match validate_email(input.trim()) {
                Ok(()) => Ok(inquire::validator::Validation::Valid),
                Err(e) => Ok(inquire::validator::Validation::Invalid(e.into())),
            })
            .prompt()?,
    };

    let password = match password {
        Some(password) => password,
        None => inquire::Password::new("Password:").prompt()?,
    };

    Ok(AdminDetails {
        name,
        email,
        password,
    })
}

fn run_init(
    data_dir: PathBuf,
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    non_interactive: bool,
) -> anyhow::Result<()> {
    fs::create_dir_all(&data_dir)?;

    let config = ServerConfig {
        data_dir,
        ..ServerConfig::default()
    };
    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    if store.has_admin()? {
        bail!(
            "Server already initialized. An administrator exists in: {}",
            config.db_path().display()
        );
    }

    let details = if non_interactive {
        let (Some(name), Some(email), Some(password)) = (name, email, password) else {
            bail!("--name, --email and --password are required with --non-interactive");
        };
        AdminDetails {
            name,
            email,
            password,
        }
    } else {
        prompt_admin(name, email, password)?
    };

    let name = details.name.trim().to_string();
    let email = normalize_email(&details.email);
    if name.is_empty() {
        bail!("Name cannot be empty");
    }
    if let Err(e) = validate_email(&email) {
        bail!("{e}");
    }
    if details.password.is_empty() {
        bail!("Password cannot be empty");
    }

    let admin = store.create_user(
        &NewUser {
            name,
            email,
            password_hash: hash_password(&details.password)?,
        },
        Role::Admin,
    )?;
    let key = rotate_signup_key(&store)?;

    println!();
    println!("========================================");
    println!("Created administrator '{}' <{}>", admin.name, admin.email);
    println!();
    println!("Signup link (share with new users):");
    println!();
    println!("  {}", config.signup_link(&key));
    println!("========================================");
    println!();

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("cheis=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                name,
                email,
                password,
                non_interactive,
            } => {
                run_init(data_dir, name, email, password, non_interactive)?;
            }
        },
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
            public_base_url,
        } => {
            let mut config = match config {
                Some(path) => ServerConfig::from_file(&path)?,
                None => ServerConfig::default(),
            };
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            if public_base_url.is_some() {
                config.public_base_url = public_base_url;
            }

            if !config.db_path().exists() {
                bail!(NOT_INITIALIZED);
            }

            let store = SqliteStore::new(config.db_path())?;
            store.initialize()?;
            if !store.has_admin()? {
                bail!(NOT_INITIALIZED);
            }

            let state = Arc::new(AppState::new(Arc::new(store), &config));
            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
