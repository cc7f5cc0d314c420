//! Farm storage.
//!
//! Farms (`finca`) are the top-level tenant unit: cattle, memberships, and
//! link codes are all scoped to a farm.

use serde::Serialize;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;

use crate::{PgPool, StorageError, StorageResult};

// =============================================================================
// Types
// =============================================================================

/// Farm record from the `finca` table.
#[derive(Debug, Clone, Serialize)]
pub struct FarmRow {
    pub id_finca: i64,
    pub nombre: String,
    pub tamano: f64,
    /// Owning user (numeric id), if recorded.
    pub id_usuario: Option<i64>,
}

type FarmTuple = (i64, String, f64, Option<i64>);

impl FarmRow {
    fn from_tuple(row: FarmTuple) -> Self {
        Self {
            id_finca: row.0,
            nombre: row.1,
            tamano: row.2,
            id_usuario: row.3,
        }
    }
}

// =============================================================================
// Farm Storage
// =============================================================================

/// Farm storage operations.
pub struct FarmStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> FarmStorage<'a> {
    /// Create a new farm storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find a farm by its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: i64) -> StorageResult<Option<FarmRow>> {
        let row: Option<FarmTuple> = query_as(
            r#"
            SELECT id_finca, nombre, tamano, id_usuario
            FROM finca
            WHERE id_finca = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(FarmRow::from_tuple))
    }

    /// Check whether a farm exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn exists(&self, id: i64) -> StorageResult<bool> {
        let row: (bool,) =
            query_as(r#"SELECT EXISTS (SELECT 1 FROM finca WHERE id_finca = $1)"#)
                .bind(id)
                .fetch_one(self.pool)
                .await?;

        Ok(row.0)
    }

    /// Create a new farm.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create(
        &self,
        nombre: &str,
        tamano: f64,
        id_usuario: Option<i64>,
    ) -> StorageResult<FarmRow> {
        let row: FarmTuple = query_as(
            r#"
            INSERT INTO finca (nombre, tamano, id_usuario)
            VALUES ($1, $2, $3)
            RETURNING id_finca, nombre, tamano, id_usuario
            "#,
        )
        .bind(nombre)
        .bind(tamano)
        .bind(id_usuario)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx_core::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StorageError::conflict(format!("La finca '{nombre}' ya existe"));
            }
            StorageError::from(e)
        })?;

        Ok(FarmRow::from_tuple(row))
    }

    /// Update a farm's name and/or size. Fields passed as `None` keep their
    /// current value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn update(
        &self,
        id: i64,
        nombre: Option<&str>,
        tamano: Option<f64>,
    ) -> StorageResult<Option<FarmRow>> {
        let row: Option<FarmTuple> = query_as(
            r#"
            UPDATE finca
            SET nombre = COALESCE($2, nombre),
                tamano = COALESCE($3, tamano)
            WHERE id_finca = $1
            RETURNING id_finca, nombre, tamano, id_usuario
            "#,
        )
        .bind(id)
        .bind(nombre)
        .bind(tamano)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(FarmRow::from_tuple))
    }

    /// Delete a farm. Returns whether a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete(&self, id: i64) -> StorageResult<bool> {
        let result = query(r#"DELETE FROM finca WHERE id_finca = $1"#)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List all farms.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> StorageResult<Vec<FarmRow>> {
        let rows: Vec<FarmTuple> = query_as(
            r#"
            SELECT id_finca, nombre, tamano, id_usuario
            FROM finca
            ORDER BY id_finca
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(FarmRow::from_tuple).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn farm_row_serializes_with_column_names() {
        let row = FarmRow {
            id_finca: 42,
            nombre: "La Esperanza".into(),
            tamano: 12.5,
            id_usuario: Some(7),
        };
        let j = serde_json::to_value(&row).unwrap();
        assert_eq!(j["id_finca"], 42);
        assert_eq!(j["nombre"], "La Esperanza");
        assert_eq!(j["tamano"], 12.5);
        assert_eq!(j["id_usuario"], 7);
    }
}
