use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chess_session::{
    config::DbConfig,
    session::{current_opponents, find_existing},
    ChallengeNegotiator, ChallengeOutcome, GameStore, GroupId, MatchKey, MatchSession, PgStore,
    PlayerId, PlayerNames, SyncMode,
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "chess_session")]
#[command(about = "Challenge players and play persisted chess matches")]
struct Cli {
    #[command(flatten)]
    db: DbConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Challenge a player, or accept their challenge by challenging back.
    Challenge {
        group: GroupId,
        challenger: PlayerId,
        opponent: PlayerId,
    },
    /// Withdraw a pending challenge.
    Withdraw {
        group: GroupId,
        challenger: PlayerId,
        opponent: PlayerId,
    },
    /// Play moves in coordinate notation (e2e4) for the side to move.
    Move {
        group: GroupId,
        white: PlayerId,
        black: PlayerId,
        #[arg(required = true)]
        moves: Vec<String>,
        /// Write a rendering of the final board here.
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Offer, accept or decline a draw.
    Draw {
        #[arg(value_enum)]
        action: DrawAction,
        group: GroupId,
        white: PlayerId,
        black: PlayerId,
        player: PlayerId,
    },
    /// List the opponents a player has running games against.
    Games { group: GroupId, player: PlayerId },
    /// Print the board of a running game.
    Show {
        group: GroupId,
        white: PlayerId,
        black: PlayerId,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DrawAction {
    Offer,
    Accept,
    Decline,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=debug", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let store = PgStore::new(cli.db.connect().await?);
    if !cli.db.skip_migrations {
        store.migrate().await.context("running migrations")?;
    }

    if let Err(e) = run(cli.command, Arc::new(store)).await {
        tracing::warn!("{e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Command, store: Arc<dyn GameStore>) -> Result<()> {
    match command {
        Command::Challenge {
            group,
            challenger,
            opponent,
        } => {
            let outcome = ChallengeNegotiator::new(store.clone())
                .challenge(challenger, opponent, group)
                .await?;
            if let ChallengeOutcome::Accepted { key } = outcome {
                MatchSession::open(store, key, PlayerNames::default(), SyncMode::Auto).await?;
            }
            print_json(&outcome)
        }
        Command::Withdraw {
            group,
            challenger,
            opponent,
        } => {
            ChallengeNegotiator::new(store)
                .withdraw(challenger, opponent, group)
                .await?;
            print_json(&serde_json::json!({ "withdrawn": true }))
        }
        Command::Move {
            group,
            white,
            black,
            moves,
            save,
        } => {
            let mut session = open_existing(store, group, white, black).await?;
            let results = session.apply_moves(&moves).await?;
            if let Some(path) = save {
                session.render()?.save(&path).await?;
            }
            print_json(&serde_json::json!({
                "count": results.len(),
                "finished": results.iter().any(|r| r.finished),
                "reaped": results.iter().any(|r| r.reaped),
                "match": session.summary(),
            }))
        }
        Command::Draw {
            action,
            group,
            white,
            black,
            player,
        } => {
            let mut session = open_existing(store, group, white, black).await?;
            match action {
                DrawAction::Offer => {
                    session.offer_draw(player).await?;
                }
                DrawAction::Accept => {
                    session.accept_draw(player).await?;
                }
                DrawAction::Decline => session.decline_draw(player).await?,
            }
            print_json(&session.summary())
        }
        Command::Games { group, player } => {
            let opponents = current_opponents(store.as_ref(), group, player).await?;
            print_json(&serde_json::json!({
                "count": opponents.len(),
                "opponents": opponents,
            }))
        }
        Command::Show {
            group,
            white,
            black,
        } => {
            let session = open_existing(store, group, white, black).await?;
            print!("{session}");
            print_json(&session.summary())
        }
    }
}

/// Opens a game that the handshake already created; never creates one.
async fn open_existing(
    store: Arc<dyn GameStore>,
    group: GroupId,
    white: PlayerId,
    black: PlayerId,
) -> Result<MatchSession> {
    let key = MatchKey::new(group, white, black)?;
    match find_existing(store.as_ref(), group, white, black).await? {
        Some(found) if found == key => {}
        Some(found) => {
            return Err(anyhow!(
                "{} plays white in that game, not {}",
                found.white,
                white
            ))
        }
        None => return Err(anyhow!("no game between {white} and {black} in group {group}")),
    }
    Ok(MatchSession::open(store, key, PlayerNames::default(), SyncMode::Auto).await?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
