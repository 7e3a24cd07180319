//! Helpline - mentor helpline ticket gateway

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use helpline::{
    chat::{ChatChannel, InMemoryChatChannel, ReactionBridge},
    config::{Args, StoreBackend},
    db::MongoClient,
    directory::{ApiUserDirectory, Credentials, StaticDirectory, UserDirectory},
    hub::NotificationHub,
    mentors::{InMemoryMentorRegistry, MentorRegistry, MongoMentorRegistry},
    server::{self, AppState},
    store::{ChannelTicketStore, MongoTicketStore, TicketStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("helpline={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Helpline - Mentor Ticket Gateway");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );
    info!("Store backend: {}", args.store_backend.as_str());
    if args.store_backend == StoreBackend::Mongo {
        info!("MongoDB: {}", args.mongodb_uri);
    }
    match &args.directory_url {
        Some(url) => info!("Directory: {}", url),
        None => info!("Directory: none (permissive)"),
    }
    info!("Drain delay: {}ms", args.drain_delay_ms);
    info!("======================================");

    let hub = Arc::new(NotificationHub::new());

    // User directory - the external source of truth for who may open a
    // ticket. Without one (dev mode only) every mentee is accepted.
    let directory: Arc<dyn UserDirectory> = match &args.directory_url {
        Some(url) => {
            let credentials = args
                .directory_credentials()
                .map(|(username, password)| Credentials { username, password });
            match ApiUserDirectory::new(url, credentials, args.token_refresh_margin()) {
                Ok(directory) => Arc::new(directory),
                Err(e) => {
                    error!("Directory client setup failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        None => {
            warn!("No directory configured - accepting all mentees");
            Arc::new(StaticDirectory::permissive())
        }
    };

    // Ticket store and mentor registry, per the configured backend
    let (store, mentors): (Arc<dyn TicketStore>, Arc<dyn MentorRegistry>) =
        match args.store_backend {
            StoreBackend::Mongo => {
                match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
                    Ok(client) => {
                        let store = match MongoTicketStore::new(
                            &client,
                            Arc::clone(&hub),
                            Arc::clone(&directory),
                            args.ticket_retention(),
                        )
                        .await
                        {
                            Ok(store) => store,
                            Err(e) => {
                                error!("Ticket store setup failed: {}", e);
                                std::process::exit(1);
                            }
                        };
                        let mentors =
                            match MongoMentorRegistry::new(&client, Arc::clone(&directory)).await {
                                Ok(mentors) => mentors,
                                Err(e) => {
                                    error!("Mentor registry setup failed: {}", e);
                                    std::process::exit(1);
                                }
                            };
                        (
                            Arc::new(store) as Arc<dyn TicketStore>,
                            Arc::new(mentors) as Arc<dyn MentorRegistry>,
                        )
                    }
                    Err(e) => {
                        if args.dev_mode {
                            warn!(
                                "MongoDB connection failed (dev mode, using channel store): {}",
                                e
                            );
                            start_channel_backend(&args, &hub, &directory).await?
                        } else {
                            error!("MongoDB connection failed: {}", e);
                            std::process::exit(1);
                        }
                    }
                }
            }
            StoreBackend::Channel => start_channel_backend(&args, &hub, &directory).await?,
        };

    let state = Arc::new(AppState::new(args, store, hub, mentors, directory));

    if let Err(e) = server::run(state).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Bring up the chat-channel backend: the in-memory channel, the store
/// reading and writing it, the mentor registry, and the reaction bridge
/// that lets mentors work tickets straight from the chat.
async fn start_channel_backend(
    args: &Args,
    hub: &Arc<NotificationHub>,
    directory: &Arc<dyn UserDirectory>,
) -> anyhow::Result<(Arc<dyn TicketStore>, Arc<dyn MentorRegistry>)> {
    let chat = Arc::new(InMemoryChatChannel::new());
    let store: Arc<dyn TicketStore> = Arc::new(ChannelTicketStore::new(
        Arc::clone(&chat) as Arc<dyn ChatChannel>,
        Arc::clone(hub),
        Arc::clone(directory),
        args.history_scan_limit,
    ));

    let mentors: Arc<dyn MentorRegistry> = match &args.mentors_file {
        Some(path) => {
            let registry = InMemoryMentorRegistry::from_file(path, Arc::clone(directory))?;
            info!("Mentor roster loaded from {}", path.display());
            Arc::new(registry)
        }
        None => Arc::new(InMemoryMentorRegistry::new(Arc::clone(directory))),
    };

    let bridge = Arc::new(ReactionBridge::new(
        Arc::clone(&store),
        Arc::clone(&mentors),
        args.claim_emote.clone(),
        args.complete_emote.clone(),
    ));

    // The bridge follows the queue for the life of the process; the
    // receipts are never used to unsubscribe.
    let _receipts = bridge.attach(hub);

    // Tickets already in the channel from a previous run keep working.
    let recovered = store.open_tickets().await?;
    for ticket in &recovered {
        bridge.watch(&ticket.id);
    }
    if !recovered.is_empty() {
        info!("Recovered {} open ticket(s) from the channel", recovered.len());
    }

    if let Some(reactions) = chat.take_reactions() {
        bridge.spawn(reactions);
    }

    Ok((store, mentors))
}
