pub mod admission;
pub mod booking;
pub mod events;
pub mod memory;
pub mod notification;
pub mod notifier;
pub mod projector;
pub mod property;
pub mod repository;

pub use admission::{AdmissionController, AdmissionError, BookingRequest};
pub use booking::{Actor, Booking, BookingStatus, CancelActor, TransitionError};
pub use events::{BookingEvent, EventHandler, HandlerOutcome};
pub use notification::{Notification, NotificationSink};
pub use notifier::StatusNotifier;
pub use projector::RequestProjector;
pub use property::Property;
pub use repository::{BookingStore, PropertyStore, StoreError};
