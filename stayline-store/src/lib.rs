pub mod app_config;
pub mod booking_repo;
pub mod consumer;
pub mod database;
pub mod dispatcher;
pub mod events;
pub mod outbox;
pub mod property_repo;

pub use app_config::Config;
pub use booking_repo::BookingRepository;
pub use consumer::EventConsumer;
pub use database::DbClient;
pub use dispatcher::OutboxDispatcher;
pub use events::{EventProducer, PublishError};
pub use outbox::OutboxRepository;
pub use property_repo::PropertyRepository;
