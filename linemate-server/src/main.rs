use std::sync::Arc;

use linemate_core::config::LinemateConfig;
use linemate_graph::adjacency::{index_channel, TeammateIndex};
use linemate_query::engine::QueryEngine;
use linemate_server::http::{build_router, AppState};
use linemate_server::session::SessionRegistry;
use linemate_server::ws::RoomHub;
use linemate_store::snapshot::SnapshotEngine;
use linemate_store::store::GraphStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args().nth(1);
    let config = match LinemateConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("config error: {err}");
            std::process::exit(1);
        }
    };

    let store = Arc::new(GraphStore::new(&config.store));

    // Load the newest snapshot, if any. The server itself never writes;
    // ingestion runs produce the snapshots it serves.
    if config.store.snapshot_enabled {
        let snapshots = SnapshotEngine::new(config.store.data_dir.clone());
        match snapshots.latest_snapshot() {
            Ok(Some(path)) => match snapshots.load_snapshot(&path) {
                Ok(snapshot) => {
                    store.load_snapshot_data(snapshot);
                    let inner = store.read();
                    tracing::info!(
                        "loaded snapshot {}: {} players, {} games",
                        path.display(),
                        inner.player_count(),
                        inner.game_count(),
                    );
                }
                Err(err) => tracing::error!("snapshot load failed: {err}"),
            },
            Ok(None) => tracing::info!("no snapshot found, starting with an empty store"),
            Err(err) => tracing::error!("snapshot scan failed: {err}"),
        }
    }

    // Index build happens off the startup path; queries block until it is
    // published.
    let (publisher, index) = index_channel();
    let index_store = Arc::clone(&store);
    tokio::spawn(async move {
        let built = TeammateIndex::build(index_store.read().games());
        tracing::info!(
            players = built.player_count(),
            pairs = built.edge_count(),
            "adjacency index ready"
        );
        publisher.publish(built);
    });

    let engine = Arc::new(QueryEngine::new(Arc::clone(&store), index, &config.game));
    let rooms = Arc::new(RoomHub::new(config.server.room_buffer));
    let sessions = Arc::new(SessionRegistry::new(
        Arc::clone(&engine),
        Arc::clone(&rooms),
        &config,
    ));
    let app = build_router(AppState {
        engine,
        sessions,
        rooms,
    });

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind {addr}: {err}");
            std::process::exit(1);
        }
    };
    tracing::info!("linemate server listening on {}", addr);

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("server error: {err}");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown requested");
}
