//! Premium tier lookup storage (`premium`).

use serde::Serialize;
use sqlx_core::query_as::query_as;

use crate::{PgPool, StorageResult};

/// Premium tier record. Tier 1 is Free, tier 2 is Premium.
#[derive(Debug, Clone, Serialize)]
pub struct PremiumRow {
    pub id_premium: i32,
    pub descripcion: String,
}

/// Premium tier storage operations.
pub struct PremiumStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> PremiumStorage<'a> {
    /// Create a new premium storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List the available premium tiers.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> StorageResult<Vec<PremiumRow>> {
        let rows: Vec<(i32, String)> = query_as(
            r#"
            SELECT id_premium, descripcion
            FROM premium
            ORDER BY id_premium
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id_premium, descripcion)| PremiumRow {
                id_premium,
                descripcion,
            })
            .collect())
    }
}
