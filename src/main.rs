use ringline::config::Config;
use ringline::domain::call::{
    format_duration, filter_history, CallEventKind, CallSessionManager, CallSettings,
    HistoryFilter, RemoteUser,
};
use ringline::domain::identity::StaticIdentity;
use ringline::infrastructure::metrics::describe_call_metrics;
use ringline::infrastructure::persistence::StoreCallRepository;
use ringline::infrastructure::store::{MemoryDataStore, RemoteDataStore};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_USER: &str = "alice";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Ringline");
    info!("Configuration loaded: {:?}", config);

    describe_call_metrics();

    let store = MemoryDataStore::new();
    seed_profiles(&store, &config).await?;

    let repository = Arc::new(StoreCallRepository::new(
        Arc::new(store.clone()),
        config.store.clone(),
    ));
    let user = config
        .identity
        .user_id
        .clone()
        .unwrap_or_else(|| DEFAULT_USER.to_string());
    let identity = Arc::new(StaticIdentity::signed_in(user.clone()));

    let mut manager = CallSessionManager::new(
        repository,
        identity,
        CallSettings::from(&config.call),
    );
    info!("Signed in as {}", user);

    // Demo: one call through its whole lifecycle
    demo_call_lifecycle(&mut manager, &config).await?;

    info!("Ringline demo finished");
    Ok(())
}

async fn seed_profiles(store: &MemoryDataStore, config: &Config) -> anyhow::Result<()> {
    let profiles = [
        ("alice", "Alice", "alice@example.com", "0600000001"),
        ("bob", "Bob", "bob@example.com", "0600000002"),
    ];

    for (id, pseudo, email, numero) in profiles {
        let path = format!("{}/{}", config.store.profiles_root, id);
        store
            .set(
                &path,
                json!({ "email": email, "pseudo": pseudo, "numero": numero }),
            )
            .await?;
    }

    Ok(())
}

async fn demo_call_lifecycle(
    manager: &mut CallSessionManager,
    config: &Config,
) -> anyhow::Result<()> {
    info!("=== Call Lifecycle Demo ===");

    let mut events = manager.subscribe();
    let listener = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match event.kind {
                    CallEventKind::StatusChanged {
                        status,
                        remote_user,
                    } => {
                        let who = remote_user.map(|u| u.name).unwrap_or_default();
                        info!("Status: {} {}", status, who);
                    }
                    CallEventKind::DurationChanged { seconds } => {
                        info!("Talk time: {}", format_duration(seconds));
                    }
                },
                Err(RecvError::Lagged(missed)) => warn!("Missed {} call events", missed),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let callee = match manager.user_profile(&"bob".into()).await? {
        Some(profile) => profile.to_remote_user(),
        None => RemoteUser::new("bob", "Bob"),
    };

    let call_id = manager.make_call(callee).await?;
    info!("Call {} placed, state {}", call_id, manager.state());

    manager.answer_call().await?;
    tokio::time::sleep(config.call.tick_interval() * 3 + Duration::from_millis(100)).await;
    manager.toggle_mute();
    manager.end_call().await?;

    let view = manager.call_history_with_profiles().await?;
    for entry in filter_history(&view.entries, HistoryFilter::All) {
        let name = view
            .profiles
            .get(&entry.remote_user_id)
            .map(|p| p.display_name())
            .unwrap_or("Unknown User");
        info!(
            "History: {} with {} ({}) {}",
            entry.status,
            name,
            entry
                .direction
                .map(|d| d.to_string())
                .unwrap_or_default(),
            format_duration(entry.duration)
        );
    }

    manager.cleanup();
    listener.await?;

    Ok(())
}
