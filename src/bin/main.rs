use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use crossterm::{
    cursor::MoveTo,
    execute,
    style::Stylize,
    terminal::{Clear, ClearType},
};
use prefs_core::learning::is_lost_update;
use prefs_core::{Degradable, EmailItem, EngineConfig, Outcome, PreferenceEngine, RankMode, RankOptions};
use serde::Serialize;
use std::fs;
use std::io::{stdin, stdout, Read, Write};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "prefs_engine", version, about = "Per-user email preference learning and ranking")]
struct Cli {
    /// Directory holding the profile records
    #[arg(long, global = true, env = "SWIPE_PREFS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tags extracted from an email
    Extract {
        #[arg(long, default_value = "")]
        subject: String,
        #[arg(long, default_value = "")]
        body: String,
    },
    /// Record one swipe
    Update {
        user: String,
        /// interested / not_interested (also right / left)
        outcome: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Score a tag set for a user (0-100)
    Score {
        user: String,
        tags: Vec<String>,
    },
    /// Rank a JSON array of emails read from a file or stdin
    Rank {
        user: String,
        #[arg(long)]
        input: Option<PathBuf>,
        /// smart or unread
        #[arg(long, default_value = "smart")]
        mode: String,
        /// Only keep emails newer than this RFC 3339 instant
        #[arg(long)]
        since: Option<String>,
    },
    /// Show a user's profile and insights
    Profile { user: String },
    /// Delete a user's profile
    Reset { user: String },
    /// Swipe through a JSON array of emails interactively
    Swipe {
        user: String,
        #[arg(long)]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("prefs_core={0},prefs_engine={0}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = EngineConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    debug!(data_dir = %config.data_dir.display(), "Starting prefs_engine v{}", env!("CARGO_PKG_VERSION"));

    let engine = PreferenceEngine::new(&config)
        .with_context(|| format!("opening profile store at {}", config.data_dir.display()))?;

    match cli.command {
        Commands::Extract { subject, body } => {
            print_json(&engine.extract_tokens(&subject, &body)?)?;
        }
        Commands::Update { user, outcome, tags } => {
            let outcome: Outcome = outcome.parse()?;
            let result = engine.update_preferences(&user, &tags, outcome)?;
            if let Some(reason) = result.reason() {
                eprintln!("warning: {}", reason);
            }
            print_json(result.value())?;
        }
        Commands::Score { user, tags } => {
            println!("{}", engine.score_email(&user, &tags)?);
        }
        Commands::Rank {
            user,
            input,
            mode,
            since,
        } => {
            let items = read_items(input.as_ref())?;
            let mut options = RankOptions::new(mode.parse::<RankMode>()?);
            if let Some(since) = since {
                let since = DateTime::parse_from_rfc3339(&since)
                    .with_context(|| format!("invalid --since '{}'", since))?;
                options = options.since(since.with_timezone(&Utc));
            }
            print_json(&engine.rank_emails(&user, items, &options)?)?;
        }
        Commands::Profile { user } => {
            print_json(&engine.get_profile(&user)?)?;
        }
        Commands::Reset { user } => {
            if !engine.reset_profile(&user)? {
                bail!("could not reset profile for '{}'", user);
            }
            println!("Profile for '{}' reset", user);
        }
        Commands::Swipe { user, input } => {
            run_swipe_session(&engine, &user, &input)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_items(input: Option<&PathBuf>) -> Result<Vec<EmailItem>> {
    let raw = match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    serde_json::from_str(&raw).context("expected a JSON array of emails")
}

fn run_swipe_session(engine: &PreferenceEngine, user: &str, input: &PathBuf) -> Result<()> {
    let items = read_items(Some(input))?;
    let ranked = engine.rank_emails(user, items, &RankOptions::new(RankMode::Smart))?;
    let total = ranked.len();
    let mut swiped = 0usize;

    for (i, entry) in ranked.iter().enumerate() {
        let item = &entry.item;
        print_card(i + 1, total, item, entry.preference_score_percent)?;

        let mut line = String::new();
        if stdin().read_line(&mut line)? == 0 {
            break;
        }
        let outcome = match line.trim() {
            "q" => break,
            "y" => Outcome::Good,
            "n" => Outcome::Bad,
            _ => continue,
        };

        match engine.update_preferences(user, &item.tags, outcome) {
            Ok(Degradable::Ok(_)) => swiped += 1,
            Ok(Degradable::Degraded(_, reason)) if is_lost_update(&reason) => {
                println!("{}", format!("Swipe not saved: {}", reason).yellow());
                pause()?;
            }
            Ok(Degradable::Degraded(_, _)) => swiped += 1,
            Err(e) => {
                println!("{}", format!("Skipped: {}", e).yellow());
                pause()?;
            }
        }
    }

    let view = engine.get_profile(user)?;
    println!();
    println!("{}", format!("Recorded {} swipe(s) for '{}'", swiped, user).bold());
    println!("Profile strength: {}%", view.insights.profile_strength);
    if !view.insights.top_interests.is_empty() {
        let tags: Vec<&str> = view.insights.top_interests.iter().map(|t| t.tag.as_str()).collect();
        println!("Interested in: {}", tags.join(", ").green());
    }
    if !view.insights.top_dislikes.is_empty() {
        let tags: Vec<&str> = view.insights.top_dislikes.iter().map(|t| t.tag.as_str()).collect();
        println!("Not interested in: {}", tags.join(", ").red());
    }
    Ok(())
}

fn print_card(position: usize, total: usize, item: &EmailItem, percent: u8) -> Result<()> {
    let mut out = stdout();
    execute!(out, Clear(ClearType::All), MoveTo(0, 0))?;

    println!("{}", format!("Email {} of {}", position, total).bold());
    println!("---------------------------------------------------------------");
    println!("Subject: {}", item.subject.as_deref().unwrap_or("(no subject)").bold());
    let preview: String = item.text().chars().take(280).collect();
    if !preview.is_empty() {
        println!("\n{}", preview);
    }
    println!();
    println!("Tags:  {}", item.tags.join(", ").cyan());
    let score = format!("{}%", percent);
    let score = match percent {
        p if p > 50 => score.green(),
        p if p < 50 => score.red(),
        _ => score.grey(),
    };
    println!("Match: {}", score);
    println!("\n[y] interested  [n] not interested  [Enter] skip  [q] quit");
    print!("> ");
    out.flush()?;
    Ok(())
}

fn pause() -> Result<()> {
    print!("(press Enter)");
    stdout().flush()?;
    stdin().read_line(&mut String::new())?;
    Ok(())
}
