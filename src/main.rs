use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_event_agent::config::AppConfig;
use order_event_agent::consumer::{OrderEventAgent, OrderEventDispatcher};
use order_event_agent::messaging::KafkaMessageSource;
use order_event_agent::metrics::{self, Metrics};
use order_event_agent::repository::InMemoryOrderRepository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional local overrides; deployments set the environment directly
    dotenvy::dotenv().ok();

    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_event_agent=debug"))
        )
        .init();

    tracing::info!("🚀 Starting order event agent");

    // === 1. Configuration (missing KAFKA_BROKERS is fatal) ===
    let config = AppConfig::load()?;
    tracing::info!(
        brokers = %config.kafka.brokers,
        order_topic = %config.topics.order,
        "Configuration loaded"
    );

    // === 2. Initialize Prometheus metrics ===
    let metrics = Arc::new(Metrics::new()?);

    // === 3. Order store and dispatcher ===
    // Standalone runs keep orders in memory; the command service wires its own store
    let repository = Arc::new(InMemoryOrderRepository::new());
    let dispatcher = OrderEventDispatcher::new(repository).with_metrics(metrics.clone());

    // === 4. Subscribe to the orders channel ===
    let source = KafkaMessageSource::subscribe(&config.kafka, &config.consumer, &config.topics.order)?;
    let mut agent = OrderEventAgent::new(source, dispatcher, config.consumer.clone())
        .with_metrics(metrics.clone());
    let handle = agent.handle();

    // === 5. Metrics HTTP server in background thread ===
    if config.metrics.enabled {
        let registry = Arc::new(metrics.registry().clone());
        let health = handle.clone();
        let port = config.metrics.port;
        std::thread::spawn(move || {
            let system = actix_web::rt::System::new();
            if let Err(e) = system.block_on(metrics::start_metrics_server(registry, health, port)) {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    }

    // === 6. Stop polling on Ctrl-C ===
    let shutdown = handle.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => shutdown.stop(),
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    agent.run().await;
    agent.safe_close().await;

    tracing::info!("🎉 Order event agent exited");
    Ok(())
}
