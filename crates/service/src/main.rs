//! Order service entry point.
//!
//! Runs the background machinery of the order service: the outbox
//! relay, the payment event ingress and the stalled saga sweep. Order
//! placement itself is exposed by the `orders` crate to whatever edge
//! embeds it.

use messaging::InMemoryMessageChannel;
use service::{Config, Worker};
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryStore, PostgresStore, Store};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn run_worker<S: Store + Clone + 'static>(store: S, config: Config) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // The in-memory channel stands in until a real broker client is
    // wired to the same trait; that client would also take `inbound`
    // and forward payment events through it.
    let (worker, inbound) = Worker::new(store, InMemoryMessageChannel::new(), &config);
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    tracing::info!("order service started");
    shutdown_signal().await;

    shutdown_tx.send(true).expect("shutdown receivers dropped");
    let _ = worker_handle.await;
    drop(inbound);
    tracing::info!("order service shut down gracefully");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.metrics_port))
        .install()
        .expect("failed to install Prometheus exporter");

    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to Postgres");
            let store = PostgresStore::new(pool);
            store.run_migrations().await.expect("migrations failed");
            tracing::info!("using Postgres store");
            run_worker(store, config).await;
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory store");
            run_worker(InMemoryStore::new(), config).await;
        }
    }
}
