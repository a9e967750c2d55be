use std::sync::Arc;

use stayline_core::admission::AdmissionController;
use stayline_store::{BookingRepository, PropertyRepository};

#[derive(Clone)]
pub struct AuthSettings {
    pub secret: String,
}

#[derive(Clone)]
pub struct Topics {
    pub requests: String,
    pub updates: String,
}

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingRepository>,
    pub properties: Arc<PropertyRepository>,
    pub admission: Arc<AdmissionController>,
    pub auth: AuthSettings,
    pub topics: Topics,
}
