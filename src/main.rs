// This is the entry point of the security bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (database, audit sink)
// - `discord/` = Discord-specific adapters (events, enforcement)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Wire the Discord client and event handler
// 4. Own the background task lifecycle

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::audit::AuditSink;
use crate::core::automod::AutoModEngine;
use crate::core::ratelimit::RateLimiter;
use crate::core::violations::ViolationTracker;
use crate::discord::enforcement::SerenityGateway;
use crate::discord::{event_adapter, Data};
use crate::infra::audit::TracingAuditSink;
use crate::infra::automod::SqliteRuleStore;
use crate::infra::db::SafeQueries;
use crate::infra::violations::SqliteViolationStore;
use serenity::all::{GatewayIntents, Message, Ready};
use serenity::async_trait;
use serenity::client::{Context, EventHandler};
use serenity::http::Http;
use std::sync::Arc;
use std::time::Duration;

struct Handler {
    data: Arc<Data>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: Message) {
        if let Err(e) = event_adapter::handle_message(&ctx, &msg, &self.data).await {
            tracing::error!("Error handling message: {}", e);
        }
    }

    async fn ready(&self, _ctx: Context, ready: Ready) {
        tracing::info!("Connected as {}", ready.user.name);
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let token = std::env::var("DISCORD_TOKEN").expect(
        "Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.",
    );

    // Keep runtime databases in a dedicated folder so the repo root stays tidy.
    let data_dir = "data";
    std::fs::create_dir_all(data_dir).expect("Failed to create data directory for SQLite files");
    let db_path = std::env::var("MODGUARD_DB_PATH")
        .unwrap_or_else(|_| format!("{}/security.db", data_dir));

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .connect(&format!("sqlite://{}?mode=rwc", db_path))
        .await
        .expect("Failed to connect to security DB");

    let audit = Arc::new(TracingAuditSink::new());
    let db = SafeQueries::new(pool).with_audit(Arc::clone(&audit) as Arc<dyn AuditSink>);
    db.migrate().await.expect("Failed to migrate security DB");

    let rate_limiter = Arc::new(RateLimiter::new());
    let sweep_interval = std::env::var("MODGUARD_SWEEP_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(60);
    let sweeper = rate_limiter.spawn_sweeper(Duration::from_secs(sweep_interval));

    let violations = Arc::new(ViolationTracker::new(SqliteViolationStore::new(db.clone())));

    // The gateway gets its own HTTP client; the serenity Client builds one
    // internally that is not available until after the handler is wired.
    let http = Arc::new(Http::new(&token));
    let engine = Arc::new(AutoModEngine::new(
        SqliteRuleStore::new(db.clone()),
        Arc::clone(&violations),
        SerenityGateway::new(Arc::clone(&http)),
        Arc::clone(&audit),
    ));

    let data = Arc::new(Data {
        rate_limiter: Arc::clone(&rate_limiter),
        engine,
        violations,
        audit,
    });

    // ========================================================================
    // DISCORD CLIENT SETUP
    // ========================================================================

    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT // Required to read message content
        | GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS;

    let mut client = serenity::Client::builder(&token, intents)
        .event_handler(Handler { data })
        .await
        .expect("Error creating client");

    if let Err(e) = client.start().await {
        tracing::error!("Client error: {}", e);
    }

    // Stop background tasks before the process exits.
    sweeper.stop();
}
