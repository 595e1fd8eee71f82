//! Administration CLI for the collaborative itinerary server.
//!
//! Wires the SQLite store, the in-memory event bus and the configured
//! email provider into a [`CollabServer`] and exposes maintenance
//! commands against it.

use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use felttrip_collab::config::ServerConfig;
use felttrip_collab::email::create_provider;
use felttrip_collab::handlers::invites;
use felttrip_collab::CollabServer;
use felttrip_events_memory::MemoryEventBus;
use felttrip_storage::{ItineraryId, PrincipalId, Store};
use felttrip_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(name = "felttrip-server")]
#[command(about = "Felttrip server CLI for administration")]
struct Cli {
    /// Database URL (sqlite://path/to/db.db)
    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        default_value = "sqlite://felttrip.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Itinerary inspection commands
    Itinerary {
        #[command(subcommand)]
        itinerary_cmd: ItineraryCommand,
    },
    /// Invitation management commands
    Invite {
        #[command(subcommand)]
        invite_cmd: InviteCommand,
    },
}

#[derive(Subcommand)]
enum ItineraryCommand {
    /// List itineraries a principal owns or collaborates on
    List {
        /// Principal id (UUID)
        principal: String,
    },
}

#[derive(Subcommand)]
enum InviteCommand {
    /// List all invitations for an itinerary
    List {
        /// Itinerary id (UUID)
        itinerary: String,
    },
    /// Mark every overdue pending invitation as expired
    Sweep,
}

async fn build_server(database_url: &str) -> Result<CollabServer, Box<dyn std::error::Error>> {
    let store = Arc::new(SqliteStore::open(database_url).await?);
    let events = Arc::new(MemoryEventBus::new());
    let config = ServerConfig::from_env()?;
    let mailer = match &config.email {
        Some(email_config) => Some(Arc::from(create_provider(email_config)?)),
        None => None,
    };
    Ok(CollabServer::new(store, events, config, mailer))
}

async fn cmd_itinerary_list(
    server: &CollabServer,
    principal: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let principal = PrincipalId(Uuid::from_str(principal)?);
    let itineraries = server.store.list_itineraries_for(&principal).await?;
    if itineraries.is_empty() {
        println!("No itineraries for {}", principal);
        return Ok(());
    }
    for itinerary in itineraries {
        println!(
            "{}  {:<30}  {} item(s), {} collaborator(s)",
            itinerary.id,
            itinerary.name,
            itinerary.items.len(),
            itinerary.collaborators.len()
        );
    }
    Ok(())
}

async fn cmd_invite_list(
    server: &CollabServer,
    itinerary: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let itinerary = ItineraryId(Uuid::from_str(itinerary)?);
    let invitations = server.store.list_invitations(&itinerary).await?;
    if invitations.is_empty() {
        println!("No invitations for {}", itinerary);
        return Ok(());
    }
    for invitation in invitations {
        println!(
            "{:<40}  {:<8}  {:<8}  expires {}",
            invitation.email,
            invitation.role.as_str(),
            invitation.status.as_str(),
            invitation.expires_at.to_rfc3339()
        );
    }
    Ok(())
}

async fn cmd_invite_sweep(server: &CollabServer) -> Result<(), Box<dyn std::error::Error>> {
    let swept = invites::sweep_expired_invitations(server).await?;
    println!("Marked {} invitation(s) expired", swept);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let server = build_server(&cli.database_url).await?;

    match cli.command {
        Command::Itinerary { itinerary_cmd } => match itinerary_cmd {
            ItineraryCommand::List { principal } => {
                cmd_itinerary_list(&server, &principal).await?;
            }
        },
        Command::Invite { invite_cmd } => match invite_cmd {
            InviteCommand::List { itinerary } => {
                cmd_invite_list(&server, &itinerary).await?;
            }
            InviteCommand::Sweep => {
                cmd_invite_sweep(&server).await?;
            }
        },
    }

    Ok(())
}
