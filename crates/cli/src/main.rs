//! Belgrano Tickets CLI - schema setup and account maintenance.
//!
//! # Usage
//!
//! ```bash
//! # Apply both schemas
//! bt-cli migrate
//!
//! # Create the default accounts on an empty database
//! bt-cli seed
//!
//! # Restore the default accounts' known passwords
//! bt-cli reset-credentials
//!
//! # Create a courier
//! bt-cli user create --username repartidor6 --email r6@belgranoahorro.com \
//!     --nombre "Repartidor 6" --role flota
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - Tickets/users database (default: `sqlite://tickets.db`)
//! - `CATALOG_DATABASE_URL` - Catalog database (default: `sqlite://belgrano_ahorro.db`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "bt-cli")]
#[command(author, version, about = "Belgrano Tickets CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the ticket and catalog schemas
    Migrate,
    /// Create the default accounts if no users exist
    Seed,
    /// Re-hash and reactivate the default accounts
    ResetCredentials,
    /// Manage panel users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new panel user
    Create {
        /// Login handle
        #[arg(short, long)]
        username: String,

        /// Email address used to log in
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        nombre: String,

        /// Role (`admin` or `flota`)
        #[arg(short, long, default_value = "flota")]
        role: String,

        /// Password; a random one is generated and logged when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await,
        Commands::Seed => commands::seed::default_users().await,
        Commands::ResetCredentials => commands::seed::reset_credentials().await,
        Commands::User { action } => match action {
            UserAction::Create {
                username,
                email,
                nombre,
                role,
                password,
            } => {
                commands::user::create(&username, &email, &nombre, &role, password)
                    .await
                    .map(|_| ())
            }
        },
    }
}
