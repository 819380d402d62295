//! CLI administration tool for shortkeep.
//!
//! Provides commands for inspecting and expiring links and performing
//! database checks without going through the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # List a user's links
//! cargo run --bin admin -- urls list --user 42
//!
//! # Expire a link now, in both stores
//! cargo run --bin admin -- urls expire ab12c
//!
//! # View statistics
//! cargo run --bin admin -- stats
//!
//! # Check database connection
//! cargo run --bin admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! Loaded the same way as the server:
//!
//! - `DATABASE_URL` or `DB_*` components (required)
//! - `REDIS_URL` or `REDIS_*` components (optional): when set, `urls expire`
//!   also evicts the cache keys
//! - `CACHE_KEY_PREFIX` (optional): must match the server's prefix

use shortkeep::config::Config;
use shortkeep::domain::entities::UrlRecord;
use shortkeep::domain::repositories::UrlRepository;
use shortkeep::infrastructure::cache::{CacheService, RedisCache, keys};
use shortkeep::infrastructure::persistence::PgUrlRepository;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use sqlx::PgPool;
use std::sync::Arc;

/// CLI tool for managing shortkeep.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Inspect and expire links
    Urls {
        #[command(subcommand)]
        action: UrlsAction,
    },

    /// Show statistics
    Stats,

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

/// Link subcommands.
#[derive(Subcommand)]
enum UrlsAction {
    /// List a user's links, newest first
    List {
        /// Owner id
        #[arg(short, long)]
        user: i64,

        /// Only active (true) or inactive (false) links
        #[arg(short, long)]
        active: Option<bool>,

        #[arg(short, long, default_value_t = 50)]
        limit: i64,
    },

    /// Deactivate a link and evict it from the cache
    Expire {
        /// Short code of the link
        code: String,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,

    /// Show database info
    Info,
}

#[derive(sqlx::FromRow)]
struct CodeLookup {
    id: i64,
    user_id: i64,
    original_url: String,
    is_active: bool,
    expires_at: DateTime<Utc>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    match cli.command {
        Commands::Urls { action } => handle_urls_action(action, &pool, &config).await?,
        Commands::Stats => handle_stats(&pool).await?,
        Commands::Db { action } => handle_db_action(action, &pool).await?,
    }

    Ok(())
}

/// Dispatches link commands.
async fn handle_urls_action(action: UrlsAction, pool: &PgPool, config: &Config) -> Result<()> {
    let repo = Arc::new(PgUrlRepository::new(Arc::new(pool.clone())));

    match action {
        UrlsAction::List {
            user,
            active,
            limit,
        } => list_urls(repo, user, active, limit).await?,
        UrlsAction::Expire { code, yes } => expire_url(repo, pool, config, code, yes).await?,
    }

    Ok(())
}

/// Lists a user's links with status indicators.
///
/// # Output Format
///
/// ```text
/// 📋 Links of user 42
///
///   ID  Code       Expires              Status    Original URL
///   ────────────────────────────────────────────────────────────────────
///   2   ab12c      2025-01-16 14:20     ACTIVE    https://example.com/a
/// ```
async fn list_urls(
    repo: Arc<PgUrlRepository>,
    user: i64,
    active: Option<bool>,
    limit: i64,
) -> Result<()> {
    println!("{}", format!("📋 Links of user {user}").bright_blue().bold());
    println!();

    let urls = repo
        .list_by_owner(user, 0, limit.clamp(1, 1000), active)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list links: {}", e))?;
    let total = repo
        .count_by_owner(user, active)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to count links: {}", e))?;

    if urls.is_empty() {
        println!("{}", "  No links found".yellow());
        return Ok(());
    }

    println!(
        "  {:<6} {:<12} {:<20} {:<9} {}",
        "ID".bright_white().bold(),
        "Code".bright_white().bold(),
        "Expires".bright_white().bold(),
        "Status".bright_white().bold(),
        "Original URL".bright_white().bold()
    );
    println!("  {}", "─".repeat(80).bright_black());

    for url in &urls {
        print_row(url);
    }

    println!();
    println!(
        "  Showing {} of {}",
        urls.len().to_string().bright_white().bold(),
        total.to_string().bright_white().bold()
    );
    println!();

    Ok(())
}

fn print_row(url: &UrlRecord) {
    let status = if url.is_active {
        "ACTIVE".green()
    } else {
        "INACTIVE".red()
    };

    println!(
        "  {:<6} {:<12} {:<20} {:<9} {}",
        url.id.to_string().bright_black(),
        url.short_code.cyan(),
        url.expires_at
            .format("%Y-%m-%d %H:%M")
            .to_string()
            .bright_black(),
        status,
        url.original_url
    );
}

/// Expires a link immediately with confirmation prompt.
///
/// Marks the durable record inactive first, then evicts its cache keys when
/// Redis is configured. The origin key is evicted only while it still points
/// at this code.
async fn expire_url(
    repo: Arc<PgUrlRepository>,
    pool: &PgPool,
    config: &Config,
    code: String,
    skip_confirm: bool,
) -> Result<()> {
    println!("{}", "⏱  Expire Link".bright_blue().bold());
    println!();

    let found: Option<CodeLookup> = sqlx::query_as(
        "SELECT id, user_id, original_url, is_active, expires_at
         FROM shortened_urls WHERE short_code = $1",
    )
    .bind(&code)
    .fetch_optional(pool)
    .await?;

    let link = found.context("Link not found")?;

    if !link.is_active {
        println!("{}", "⚠️  This link is already inactive".yellow());
        return Ok(());
    }

    println!("  Code:    {}", code.cyan());
    println!("  ID:      {}", link.id.to_string().bright_black());
    println!("  Owner:   {}", link.user_id.to_string().bright_black());
    println!("  URL:     {}", link.original_url);
    println!(
        "  Expires: {}",
        link.expires_at.format("%Y-%m-%d %H:%M").to_string().bright_black()
    );
    println!();

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt("Expire this link now?")
            .default(false)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    let affected = repo
        .mark_expired_by_code(&code)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to expire link: {}", e))?;
    if affected == 0 {
        println!("{}", "⚠️  Link was deactivated concurrently".yellow());
    }

    match config.redis_url.as_deref() {
        Some(redis_url) => {
            let cache = RedisCache::connect(redis_url, config.cache_key_prefix.clone())
                .await
                .context("Failed to connect to Redis")?;
            let owned = keys::owned_lookup_keys(&cache, &code, &link.original_url)
                .await
                .context("Failed to read cache keys")?;
            let removed = cache
                .delete(&owned)
                .await
                .context("Failed to evict cache keys")?;
            println!("  Evicted {} cache key(s)", removed.to_string().bright_white());
        }
        None => {
            println!(
                "{}",
                "⚠️  Redis is not configured, cache keys were not evicted".yellow()
            );
        }
    }

    println!();
    println!("{}", "✅ Link expired".green().bold());
    println!();

    Ok(())
}

/// Displays link statistics.
async fn handle_stats(pool: &PgPool) -> Result<()> {
    println!("{}", "📊 Statistics".bright_blue().bold());
    println!();

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shortened_urls")
        .fetch_one(pool)
        .await?;

    let active: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM shortened_urls WHERE is_active = true")
            .fetch_one(pool)
            .await?;

    let owners: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT user_id) FROM shortened_urls")
        .fetch_one(pool)
        .await?;

    println!("  Links:  {}", total.to_string().bright_green().bold());
    println!("  Active: {}", active.to_string().bright_green().bold());
    println!("  Owners: {}", owners.to_string().bright_green().bold());
    println!();

    Ok(())
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());

            sqlx::query("SELECT 1").fetch_one(pool).await?;

            println!("{}", "✅ Database connection OK".green().bold());
        }
        DbAction::Info => {
            println!("{}", "ℹ️  Database Information".bright_blue().bold());
            println!();

            let version: String = sqlx::query_scalar("SELECT version()")
                .fetch_one(pool)
                .await?;

            println!("  PostgreSQL: {}", version.bright_white());
            println!();
        }
    }

    Ok(())
}
