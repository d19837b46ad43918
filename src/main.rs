use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

mod catalog;
mod config;
mod db;
mod document;
mod evaluator;
mod executor;
mod models;
mod notify;
mod report;
mod scoring;
mod service;
mod store;
mod streak;

use crate::config::Config;
use crate::db::PgStore;
use crate::models::{NewRating, WeekKey};
use crate::notify::ChannelSink;
use crate::service::{Engine, Outcome};

#[derive(Parser)]
#[command(name = "chai-gamification")]
#[command(about = "Badges, achievements and streaks for Chai Finder", long_about = None)]
struct Cli {
    /// TOML config file (defaults to ./chai-gamification.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo ratings and evaluate them
    Seed,
    /// Import ratings from a CSV file and evaluate them
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Record a rating and evaluate unlocks
    Rate {
        #[arg(long)]
        user: String,
        #[arg(long)]
        spot: String,
        #[arg(long)]
        photo: bool,
    },
    /// Record a mutual friendship and evaluate both users
    Befriend {
        #[arg(long)]
        user: String,
        #[arg(long)]
        friend: String,
    },
    /// Close a week for the streak (defaults to last week)
    CloseWeek {
        #[arg(long)]
        user: String,
        /// ISO week such as 2026-W42
        #[arg(long)]
        week: Option<WeekKey>,
    },
    /// Show a user's score breakdown
    Score {
        #[arg(long)]
        user: String,
    },
    /// List every badge and achievement
    Catalog,
    /// Top users by total score
    Leaderboard {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Generate a markdown progress report
    Report {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chai_gamification=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if matches!(cli.command, Commands::Catalog) {
        print_catalog();
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;
    let database_url = config.database_url()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    let (sink, mut notifications) = ChannelSink::channel();
    let printer = tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            println!("  [{}] {}", notification.user_id(), notification);
        }
    });

    let engine = Engine::new(
        PgStore::new(pool),
        sink,
        config.retry.policy(),
        config.streak.weekly_target,
    );
    run(&engine, cli.command).await?;

    drop(engine);
    printer.await.context("notification printer panicked")?;
    Ok(())
}

async fn run(engine: &Engine<PgStore, ChannelSink>, command: Commands) -> anyhow::Result<()> {
    let store = engine.store();

    match command {
        Commands::InitDb => {
            store.init_db().await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let mut count = 0;
            for rating in db::seed_ratings()? {
                if engine.ingest(&rating).await?.is_some() {
                    count += 1;
                }
            }
            for (user, friend) in [("avery", "jules"), ("avery", "kiara")] {
                if store.add_friendship(user, friend).await? {
                    engine.on_friend_added(user, Utc::now()).await?;
                    engine.on_friend_added(friend, Utc::now()).await?;
                }
            }
            println!("Seed data inserted ({count} new ratings).");
        }
        Commands::Import { csv } => {
            let mut count = 0;
            for rating in db::read_ratings_csv(&csv)? {
                if engine.ingest(&rating).await?.is_some() {
                    count += 1;
                }
            }
            println!("Inserted {count} ratings from {}.", csv.display());
        }
        Commands::Rate { user, spot, photo } => {
            let rating = NewRating {
                user_id: user.clone(),
                spot_id: spot,
                has_photo: photo,
                occurred_at: Utc::now(),
                source_key: None,
            };
            let Some(outcome) = engine.ingest(&rating).await? else {
                println!("Rating already recorded.");
                return Ok(());
            };
            info!(user_id = %user, score = outcome.evaluation.score, "rating evaluated");
            print_outcome(&user, &outcome);
        }
        Commands::Befriend { user, friend } => {
            if !store.add_friendship(&user, &friend).await? {
                println!("{user} and {friend} are already friends.");
                return Ok(());
            }
            for id in [&user, &friend] {
                let outcome = engine.on_friend_added(id, Utc::now()).await?;
                print_outcome(id, &outcome);
            }
        }
        Commands::CloseWeek { user, week } => {
            let now = Utc::now();
            let week =
                week.unwrap_or_else(|| WeekKey::containing(now - chrono::Duration::days(7)));
            let count = store.ratings_in_week(&user, week).await?;
            let outcome = engine.on_week_closed(&user, week, count, now).await?;
            match outcome.streak {
                Some(update) => {
                    println!(
                        "{user}: {count} ratings in {week}, streak {} -> {} (longest {}).",
                        update.previous, update.current, update.longest
                    );
                    if let Some(evaluation) = outcome.evaluation {
                        println!("Score now {}.", evaluation.score);
                    }
                    if !outcome.report.is_clean() {
                        println!(
                            "  warning: {} writes failed, see logs",
                            outcome.report.failed.len()
                        );
                    }
                }
                None => println!("{week} was already closed for {user}."),
            }
        }
        Commands::Score { user } => {
            let progress = engine.progress(&user).await?;
            let parts = scoring::breakdown(&progress);
            println!("Score for {user}: {}", parts.total());
            println!("- achievements {}", parts.achievement_points);
            println!("- badges {} ({} held)", parts.badge_points, progress.badges.len());
            for badge in progress.badges.iter().filter_map(|id| catalog::badge(id)) {
                println!("    {} ({})", badge.name, badge.rarity);
            }
            println!(
                "- streak {} ({} weeks)",
                parts.streak_points, progress.current_streak
            );
            println!(
                "- milestone bonus {} (longest {} weeks)",
                parts.milestone_bonus, progress.longest_streak
            );
        }
        Commands::Catalog => print_catalog(),
        Commands::Leaderboard { limit } => {
            let entries = store.leaderboard(limit).await?;
            if entries.is_empty() {
                println!("No users have progress yet.");
                return Ok(());
            }
            println!("Top users by score:");
            for (rank, entry) in entries.iter().enumerate() {
                println!(
                    "{}. {} score {} with {} badges, {} week streak",
                    rank + 1,
                    entry.user_id,
                    entry.total_score,
                    entry.badge_count,
                    entry.current_streak
                );
            }
        }
        Commands::Report { user, out } => {
            let progress = engine.progress(&user).await?;
            let report = report::build_report(&user, &progress, Utc::now());
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn print_outcome(user: &str, outcome: &Outcome) {
    let evaluation = &outcome.evaluation;
    if !evaluation.unlocked_anything() {
        println!("{user}: nothing new, score {}.", evaluation.score);
    } else {
        println!(
            "{user}: {} badges and {} achievements unlocked, score {}.",
            evaluation.new_badges.len(),
            evaluation.new_achievements.len(),
            evaluation.score
        );
    }
    if !outcome.report.is_clean() {
        println!(
            "  warning: {} writes failed, see logs",
            outcome.report.failed.len()
        );
    }
}

fn print_catalog() {
    println!("Badges:");
    for badge in catalog::BADGES.iter() {
        println!(
            "- {} [{}] {} ({}, {}, requires {}): {}",
            badge.id,
            badge.icon,
            badge.name,
            badge.category.label(),
            badge.rarity,
            badge.requirement,
            badge.description
        );
    }
    println!("Achievements:");
    for achievement in catalog::ACHIEVEMENTS.iter() {
        println!(
            "- {} {} (+{}): {}",
            achievement.id, achievement.name, achievement.points, achievement.description
        );
    }
}
