//! Veterinary record storage (`informacion_veterinaria`) and the
//! treatment-medication link table (`tratamiento_medicamento`).

use serde::Serialize;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;

use crate::medication::MedicationRow;
use crate::{PgPool, StorageResult};

// =============================================================================
// Types
// =============================================================================

/// Veterinary record from the `informacion_veterinaria` table.
#[derive(Debug, Clone, Serialize)]
pub struct VetRecordRow {
    pub id_informacion_veterinaria: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub fecha_tratamiento: OffsetDateTime,
    pub diagnostico: String,
    pub tratamiento: String,
    pub nota: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

type VetRecordTuple = (
    i64,
    OffsetDateTime,
    String,
    String,
    Option<String>,
    OffsetDateTime,
    OffsetDateTime,
);

impl VetRecordRow {
    fn from_tuple(row: VetRecordTuple) -> Self {
        Self {
            id_informacion_veterinaria: row.0,
            fecha_tratamiento: row.1,
            diagnostico: row.2,
            tratamiento: row.3,
            nota: row.4,
            created_at: row.5,
            updated_at: row.6,
        }
    }
}

/// Fields for creating a veterinary record. Omitted values default to the
/// current time / empty strings, as the original backend did.
#[derive(Debug, Clone, Default)]
pub struct NewVetRecord {
    pub fecha_tratamiento: Option<OffsetDateTime>,
    pub diagnostico: Option<String>,
    pub tratamiento: Option<String>,
    pub nota: Option<String>,
}

/// A treatment-medication link with the medication embedded.
#[derive(Debug, Clone, Serialize)]
pub struct TreatmentMedicationRow {
    pub id_tratamiento_medicamento: i64,
    pub id_informacion_veterinaria: i64,
    pub id_medicamento: i64,
    pub medicamento: MedicationRow,
}

type TreatmentMedicationTuple = (i64, i64, i64, i64, String, String, String);

impl TreatmentMedicationRow {
    fn from_tuple(row: TreatmentMedicationTuple) -> Self {
        Self {
            id_tratamiento_medicamento: row.0,
            id_informacion_veterinaria: row.1,
            id_medicamento: row.2,
            medicamento: MedicationRow {
                id_medicamento: row.3,
                nombre: row.4,
                dosis: row.5,
                horas: row.6,
            },
        }
    }
}

// =============================================================================
// Vet Record Storage
// =============================================================================

/// Veterinary record storage operations.
pub struct VetRecordStorage<'a> {
    pool: &'a PgPool,
}

const VET_COLUMNS: &str = "id_informacion_veterinaria, fecha_tratamiento, diagnostico, \
     tratamiento, nota, created_at, updated_at";

impl<'a> VetRecordStorage<'a> {
    /// Create a new veterinary record storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a veterinary record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create(&self, record: &NewVetRecord) -> StorageResult<VetRecordRow> {
        let sql = format!(
            r#"
            INSERT INTO informacion_veterinaria
                (fecha_tratamiento, diagnostico, tratamiento, nota, created_at, updated_at)
            VALUES (COALESCE($1, NOW()), $2, $3, $4, NOW(), NOW())
            RETURNING {VET_COLUMNS}
            "#
        );
        let row: VetRecordTuple = query_as(&sql)
            .bind(record.fecha_tratamiento)
            .bind(record.diagnostico.as_deref().unwrap_or(""))
            .bind(record.tratamiento.as_deref().unwrap_or(""))
            .bind(&record.nota)
            .fetch_one(self.pool)
            .await?;

        Ok(VetRecordRow::from_tuple(row))
    }

    /// Find a veterinary record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: i64) -> StorageResult<Option<VetRecordRow>> {
        let sql = format!(
            "SELECT {VET_COLUMNS} FROM informacion_veterinaria WHERE id_informacion_veterinaria = $1"
        );
        let row: Option<VetRecordTuple> =
            query_as(&sql).bind(id).fetch_optional(self.pool).await?;

        Ok(row.map(VetRecordRow::from_tuple))
    }

    /// Update a veterinary record; `None` fields keep their current value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn update(
        &self,
        id: i64,
        record: &NewVetRecord,
    ) -> StorageResult<Option<VetRecordRow>> {
        let sql = format!(
            r#"
            UPDATE informacion_veterinaria
            SET fecha_tratamiento = COALESCE($2, fecha_tratamiento),
                diagnostico = COALESCE($3, diagnostico),
                tratamiento = COALESCE($4, tratamiento),
                nota = COALESCE($5, nota),
                updated_at = NOW()
            WHERE id_informacion_veterinaria = $1
            RETURNING {VET_COLUMNS}
            "#
        );
        let row: Option<VetRecordTuple> = query_as(&sql)
            .bind(id)
            .bind(record.fecha_tratamiento)
            .bind(&record.diagnostico)
            .bind(&record.tratamiento)
            .bind(&record.nota)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(VetRecordRow::from_tuple))
    }

    /// Delete a veterinary record. Returns whether a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete(&self, id: i64) -> StorageResult<bool> {
        let result = query(
            r#"DELETE FROM informacion_veterinaria WHERE id_informacion_veterinaria = $1"#,
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List all veterinary records.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> StorageResult<Vec<VetRecordRow>> {
        let sql = format!(
            "SELECT {VET_COLUMNS} FROM informacion_veterinaria ORDER BY id_informacion_veterinaria"
        );
        let rows: Vec<VetRecordTuple> = query_as(&sql).fetch_all(self.pool).await?;

        Ok(rows.into_iter().map(VetRecordRow::from_tuple).collect())
    }

    /// List the records linked from a cattle row (0 or 1 with the current
    /// schema, returned as a list for wire compatibility).
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_cattle(&self, id_ganado: i64) -> StorageResult<Vec<VetRecordRow>> {
        let rows: Vec<VetRecordTuple> = query_as(
            r#"
            SELECT iv.id_informacion_veterinaria, iv.fecha_tratamiento, iv.diagnostico,
                   iv.tratamiento, iv.nota, iv.created_at, iv.updated_at
            FROM informacion_veterinaria iv
            JOIN ganado g ON g.id_informacion_veterinaria = iv.id_informacion_veterinaria
            WHERE g.id_ganado = $1
            "#,
        )
        .bind(id_ganado)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(VetRecordRow::from_tuple).collect())
    }

    // -------------------------------------------------------------------------
    // Treatment medications
    // -------------------------------------------------------------------------

    /// Link a medication to a treatment.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn add_medication(
        &self,
        id_record: i64,
        id_medicamento: i64,
    ) -> StorageResult<TreatmentMedicationRow> {
        let row: TreatmentMedicationTuple = query_as(
            r#"
            WITH inserted AS (
                INSERT INTO tratamiento_medicamento (id_informacion_veterinaria, id_medicamento)
                VALUES ($1, $2)
                RETURNING id_tratamiento_medicamento, id_informacion_veterinaria, id_medicamento
            )
            SELECT i.id_tratamiento_medicamento, i.id_informacion_veterinaria, i.id_medicamento,
                   m.id_medicamento, m.nombre, m.dosis, m.horas
            FROM inserted i
            JOIN medicamento m ON m.id_medicamento = i.id_medicamento
            "#,
        )
        .bind(id_record)
        .bind(id_medicamento)
        .fetch_one(self.pool)
        .await?;

        Ok(TreatmentMedicationRow::from_tuple(row))
    }

    /// List the medications linked to a treatment.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn medications(&self, id_record: i64) -> StorageResult<Vec<TreatmentMedicationRow>> {
        let rows: Vec<TreatmentMedicationTuple> = query_as(
            r#"
            SELECT tm.id_tratamiento_medicamento, tm.id_informacion_veterinaria, tm.id_medicamento,
                   m.id_medicamento, m.nombre, m.dosis, m.horas
            FROM tratamiento_medicamento tm
            JOIN medicamento m ON m.id_medicamento = tm.id_medicamento
            WHERE tm.id_informacion_veterinaria = $1
            ORDER BY tm.id_tratamiento_medicamento
            "#,
        )
        .bind(id_record)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(TreatmentMedicationRow::from_tuple)
            .collect())
    }

    /// Remove a medication link from a treatment. Returns whether a row was
    /// deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn remove_medication(
        &self,
        id_record: i64,
        id_medicamento: i64,
    ) -> StorageResult<bool> {
        let result = query(
            r#"
            DELETE FROM tratamiento_medicamento
            WHERE id_informacion_veterinaria = $1 AND id_medicamento = $2
            "#,
        )
        .bind(id_record)
        .bind(id_medicamento)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn vet_record_serializes_with_embedded_medication() {
        let row = TreatmentMedicationRow::from_tuple((
            5,
            10,
            3,
            3,
            "Ivermectina".into(),
            "5ml".into(),
            "12".into(),
        ));
        let j = serde_json::to_value(&row).unwrap();
        assert_eq!(j["id_tratamiento_medicamento"], 5);
        assert_eq!(j["medicamento"]["nombre"], "Ivermectina");
    }

    #[test]
    fn vet_record_row_serialization() {
        let row = VetRecordRow::from_tuple((
            1,
            datetime!(2025-05-01 8:00:00 UTC),
            "Mastitis".into(),
            "Antibióticos".into(),
            None,
            datetime!(2025-05-01 8:00:00 UTC),
            datetime!(2025-05-01 8:00:00 UTC),
        ));
        let j = serde_json::to_value(&row).unwrap();
        assert_eq!(j["diagnostico"], "Mastitis");
        assert_eq!(j["fecha_tratamiento"], "2025-05-01T08:00:00Z");
    }
}
