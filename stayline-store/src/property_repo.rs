use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use stayline_core::property::Property;
use stayline_core::repository::{PropertyStore, StoreError};

/// Read-side access to the property catalog. Property CRUD belongs to an
/// external service; this only resolves the fields admission needs.
#[derive(Clone)]
pub struct PropertyRepository {
    pool: Pool<Postgres>,
}

#[derive(sqlx::FromRow)]
struct PropertyRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    max_guests: i32,
    available: bool,
}

impl PropertyRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PropertyStore for PropertyRepository {
    async fn find_property(&self, id: Uuid) -> Result<Option<Property>, StoreError> {
        let row = sqlx::query_as::<_, PropertyRow>(
            "SELECT id, owner_id, name, max_guests, available FROM properties WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(row.map(|r| Property {
            id: r.id,
            owner_id: r.owner_id,
            name: r.name,
            max_guests: r.max_guests,
            available: r.available,
        }))
    }
}
