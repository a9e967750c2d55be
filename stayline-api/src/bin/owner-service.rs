use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stayline_api::owner_app;
use stayline_api::state::{AppState, AuthSettings, Topics};
use stayline_core::admission::AdmissionController;
use stayline_core::notification::LogNotificationSink;
use stayline_core::notifier::StatusNotifier;
use stayline_core::projector::RequestProjector;
use stayline_store::{
    BookingRepository, Config, DbClient, EventConsumer, EventProducer, OutboxDispatcher,
    OutboxRepository, PropertyRepository,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "stayline_api=debug,stayline_store=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().expect("Failed to load config");
    tracing::info!("Starting owner service on port {}", config.server.port);

    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let bookings = Arc::new(BookingRepository::new(db.pool.clone()));
    let properties = Arc::new(PropertyRepository::new(db.pool.clone()));
    let outbox = OutboxRepository::new(db.pool.clone());

    let producer = EventProducer::new(
        &config.kafka.brokers,
        Duration::from_millis(config.kafka.ack_timeout_ms),
    )
    .expect("Failed to create Kafka producer");

    let admission = Arc::new(AdmissionController::new(properties.clone(), bookings.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dispatcher = OutboxDispatcher::new(
        outbox,
        producer.clone(),
        Duration::from_millis(config.worker.dispatch_interval_ms),
        config.worker.max_dispatch_attempts,
    );
    let dispatcher_rx = shutdown_rx.clone();
    let dispatcher_handle = tokio::spawn(async move { dispatcher.run(dispatcher_rx).await });

    let sink = Arc::new(LogNotificationSink);

    // Incoming booking requests materialize the owner-side projection.
    let projector = Arc::new(RequestProjector::new(bookings.clone(), sink.clone()));
    let request_consumer = EventConsumer::new(
        &config.kafka.brokers,
        "owner-requests",
        &config.kafka.request_topic,
        producer.clone(),
        config.worker.max_delivery_attempts,
    )
    .expect("Failed to create Kafka consumer");
    let request_rx = shutdown_rx.clone();
    let request_handle =
        tokio::spawn(async move { request_consumer.run(projector, request_rx).await });

    // Status updates performed by the traveler side (cancellations,
    // completions) converge into this projection the same way; our own
    // updates come back as no-ops.
    let notifier = Arc::new(StatusNotifier::new(bookings.clone(), sink));
    let update_consumer = EventConsumer::new(
        &config.kafka.brokers,
        "owner-updates",
        &config.kafka.update_topic,
        producer.clone(),
        config.worker.max_delivery_attempts,
    )
    .expect("Failed to create Kafka consumer");
    let update_rx = shutdown_rx.clone();
    let update_handle =
        tokio::spawn(async move { update_consumer.run(notifier, update_rx).await });

    let app_state = AppState {
        bookings,
        properties,
        admission,
        auth: AuthSettings { secret: config.auth.jwt_secret.clone() },
        topics: Topics {
            requests: config.kafka.request_topic.clone(),
            updates: config.kafka.update_topic.clone(),
        },
    };

    let app = owner_app(app_state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.expect("Failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .expect("Server error");

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(dispatcher_handle, request_handle, update_handle);
}
