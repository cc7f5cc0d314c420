//! Medication storage (`medicamento`).

use serde::Serialize;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;

use crate::{PgPool, StorageResult};

/// Medication record from the `medicamento` table.
#[derive(Debug, Clone, Serialize)]
pub struct MedicationRow {
    pub id_medicamento: i64,
    pub nombre: String,
    pub dosis: String,
    pub horas: String,
}

type MedicationTuple = (i64, String, String, String);

impl MedicationRow {
    fn from_tuple(row: MedicationTuple) -> Self {
        Self {
            id_medicamento: row.0,
            nombre: row.1,
            dosis: row.2,
            horas: row.3,
        }
    }
}

/// Medication storage operations.
pub struct MedicationStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> MedicationStorage<'a> {
    /// Create a new medication storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a medication.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create(
        &self,
        nombre: &str,
        dosis: &str,
        horas: &str,
    ) -> StorageResult<MedicationRow> {
        let row: MedicationTuple = query_as(
            r#"
            INSERT INTO medicamento (nombre, dosis, horas)
            VALUES ($1, $2, $3)
            RETURNING id_medicamento, nombre, dosis, horas
            "#,
        )
        .bind(nombre)
        .bind(dosis)
        .bind(horas)
        .fetch_one(self.pool)
        .await?;

        Ok(MedicationRow::from_tuple(row))
    }

    /// Find a medication by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: i64) -> StorageResult<Option<MedicationRow>> {
        let row: Option<MedicationTuple> = query_as(
            r#"
            SELECT id_medicamento, nombre, dosis, horas
            FROM medicamento
            WHERE id_medicamento = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(MedicationRow::from_tuple))
    }

    /// Update a medication; `None` fields keep their current value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn update(
        &self,
        id: i64,
        nombre: Option<&str>,
        dosis: Option<&str>,
        horas: Option<&str>,
    ) -> StorageResult<Option<MedicationRow>> {
        let row: Option<MedicationTuple> = query_as(
            r#"
            UPDATE medicamento
            SET nombre = COALESCE($2, nombre),
                dosis = COALESCE($3, dosis),
                horas = COALESCE($4, horas)
            WHERE id_medicamento = $1
            RETURNING id_medicamento, nombre, dosis, horas
            "#,
        )
        .bind(id)
        .bind(nombre)
        .bind(dosis)
        .bind(horas)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(MedicationRow::from_tuple))
    }

    /// Delete a medication. Returns whether a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete(&self, id: i64) -> StorageResult<bool> {
        let result = query(r#"DELETE FROM medicamento WHERE id_medicamento = $1"#)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List all medications.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> StorageResult<Vec<MedicationRow>> {
        let rows: Vec<MedicationTuple> = query_as(
            r#"
            SELECT id_medicamento, nombre, dosis, horas
            FROM medicamento
            ORDER BY id_medicamento
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(MedicationRow::from_tuple).collect())
    }
}
