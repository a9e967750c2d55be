use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Read-side view of a property. Property CRUD lives in an external
/// service; admission only needs these fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Property {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub max_guests: i32,
    pub available: bool,
}
