//! Inbox CLI client - work the letter queue from a terminal

mod client;
mod messages;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::client::InboxClient;
use crate::messages::{ActionResult, AssignRequest, InboxState};

#[derive(Parser)]
#[command(name = "inbox")]
#[command(about = "CLI client for the Kaiten inbox server")]
#[command(version)]
struct Cli {
    /// Server URL
    #[arg(short, long, env = "INBOX_SERVER", default_value = "http://localhost:8000")]
    server: String,

    /// Session token from `inbox login`
    #[arg(short, long, env = "INBOX_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print a session token
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "INBOX_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// End the current session
    Logout,

    /// Show who the token belongs to
    Whoami,

    /// Show the queue counters and the current letter
    State,

    /// Defer a letter until its party is worked through (defaults to the current one)
    Skip {
        #[arg(short, long)]
        card: Option<u64>,
    },

    /// Assign a letter to an owner (defaults to the current one)
    Assign {
        #[arg(short, long)]
        card: Option<u64>,

        /// Responsible user
        #[arg(short, long)]
        owner: u64,

        /// Additional participants
        #[arg(long = "co-owner")]
        co_owners: Vec<u64>,

        #[arg(short = 'm', long, default_value = "")]
        comment: String,

        #[arg(long)]
        multi: bool,
    },

    /// Reverse the latest assignment
    Undo,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inbox_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let client = InboxClient::new(&cli.server, cli.token)?;

    match cli.command {
        Commands::Login { username, password } => {
            let session = client.login(&username, &password).await?;
            println!("Logged in as {}", session.username);
            println!(
                "Session valid until {}",
                session.expires_at.format("%Y-%m-%d %H:%M UTC")
            );
            println!("export INBOX_TOKEN={}", session.token);
        }
        Commands::Logout => {
            client.logout().await?;
            println!("Logged out");
        }
        Commands::Whoami => {
            println!("{}", client.verify().await?.username);
        }
        Commands::State => print_state(&client.state().await?),
        Commands::Skip { card } => {
            let card_id = resolve_card(&client, card).await?;
            let state = client.skip(card_id).await?;
            println!("Skipped card {}", card_id);
            print_state(&state);
        }
        Commands::Assign {
            card,
            owner,
            co_owners,
            comment,
            multi,
        } => {
            let card_id = resolve_card(&client, card).await?;
            let result = client
                .assign(&AssignRequest {
                    card_id,
                    owner_id: owner,
                    co_owner_ids: co_owners,
                    comment_text: comment,
                    multi,
                })
                .await?;
            println!("Assigned card {} to {}", card_id, owner);
            print_result(&result);
        }
        Commands::Undo => {
            let result = client.undo().await?;
            println!("Last assignment undone");
            print_result(&result);
        }
    }

    Ok(())
}

async fn resolve_card(client: &InboxClient, card: Option<u64>) -> Result<u64> {
    if let Some(card_id) = card {
        return Ok(card_id);
    }
    match client.state().await?.current_card {
        Some(current) => Ok(current.card_id),
        None => bail!("The queue is empty"),
    }
}

fn print_state(state: &InboxState) {
    println!("{:─<60}", "");
    println!(
        "Queue: {}   Deferred: {}   Assigned this session: {}",
        state.queue_count, state.deferred_count, state.assigned_session_count
    );
    match &state.current_card {
        Some(card) => {
            println!("Current: #{} {} (card {})", card.incoming_no, card.title, card.card_id);
            for file in &card.files {
                println!("  {} [{}]", file.name, file.url);
            }
        }
        None => println!("Current: none"),
    }
}

fn print_result(result: &ActionResult) {
    for warning in &result.warnings {
        println!("warning: {}", warning);
    }
    print_state(&result.state);
}
