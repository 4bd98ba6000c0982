//! Evently CLI - operator tasks against the database
//!
//! Usage:
//!   evently migrate
//!   evently create-admin --email <email> --password <password>
//!   evently promote <email>
//!   evently demote <email>

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use evently_api::audit::{audit_log, AuditEvent};
use evently_api::auth::{normalize_email, PasswordConfig, PasswordHasher};
use evently_api::logging::init_logging;
use evently_core::{AppConfig, NewUser, PgStore, UserRepository, UserRole};

#[derive(Parser)]
#[command(name = "evently")]
#[command(about = "Evently operator CLI")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Create an administrator account
    CreateAdmin {
        #[arg(long)]
        email: String,
        /// Read from EVENTLY_ADMIN_PASSWORD when omitted
        #[arg(long, env = "EVENTLY_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        nickname: Option<String>,
    },
    /// Grant the ADMIN role to an existing user
    Promote { email: String },
    /// Revoke the ADMIN role from a user
    Demote { email: String },
}

const MIN_PASSWORD_LEN: usize = 8;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::read().context("invalid configuration")?;
    init_logging(&config.logging, &config.environment)?;
    tracing::debug!(environment = %config.environment, database = ?config.database, "Connecting to database");

    let store = PgStore::connect(&config.database)
        .await
        .context("failed to connect to PostgreSQL")?;

    let result = run(cli.command, &store).await;
    store.close().await;
    result
}

async fn run(command: Commands, store: &PgStore) -> anyhow::Result<()> {
    match command {
        Commands::Migrate => {
            store.migrate().await?;
            println!("Migrations applied");
        }
        Commands::CreateAdmin {
            email,
            password,
            nickname,
        } => {
            if password.len() < MIN_PASSWORD_LEN {
                bail!("password must be at least {MIN_PASSWORD_LEN} characters");
            }
            let email = normalize_email(&email);
            if store.find_user_by_email(&email).await?.is_some() {
                bail!("a user with email {email} already exists; use `evently promote` instead");
            }

            let hasher = PasswordHasher::new(PasswordConfig::default())?;
            let user = store
                .create_user(&NewUser {
                    email,
                    password_hash: hasher.hash(&password).await?,
                    nickname,
                    phone: None,
                    profile_picture_url: None,
                    role: UserRole::Admin,
                })
                .await?;

            audit_log(&AuditEvent::RoleChanged {
                actor_id: None,
                user_id: user.id,
                role: user.role,
            });
            println!("Created administrator {} ({})", user.email, user.id);
        }
        Commands::Promote { email } => set_role(store, &email, UserRole::Admin).await?,
        Commands::Demote { email } => set_role(store, &email, UserRole::User).await?,
    }

    Ok(())
}

async fn set_role(store: &PgStore, email: &str, role: UserRole) -> anyhow::Result<()> {
    let email = normalize_email(email);
    let Some(user) = store.find_user_by_email(&email).await? else {
        bail!("no user with email {email}");
    };

    if user.role == role {
        println!("{} already has role {}", user.email, role);
        return Ok(());
    }

    store.set_user_role(user.id, role).await?;
    audit_log(&AuditEvent::RoleChanged {
        actor_id: None,
        user_id: user.id,
        role,
    });
    println!("{}: {} -> {}", user.email, user.role, role);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_promote() {
        let cli = Cli::try_parse_from(["evently", "promote", "ops@example.com"]).unwrap();
        assert!(matches!(cli.command, Commands::Promote { email } if email == "ops@example.com"));
    }

    #[test]
    fn test_parse_create_admin() {
        let cli = Cli::try_parse_from([
            "evently",
            "create-admin",
            "--email",
            "root@example.com",
            "--password",
            "long-password",
        ])
        .unwrap();
        match cli.command {
            Commands::CreateAdmin { email, nickname, .. } => {
                assert_eq!(email, "root@example.com");
                assert!(nickname.is_none());
            }
            _ => panic!("expected create-admin"),
        }
    }
}
