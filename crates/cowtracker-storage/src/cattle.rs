//! Cattle storage (`ganado`).

use serde::Serialize;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;

use crate::farm::FarmRow;
use crate::{PgPool, StorageResult};

// =============================================================================
// Types
// =============================================================================

/// Cattle record from the `ganado` table.
#[derive(Debug, Clone, Serialize)]
pub struct CattleRow {
    pub id_ganado: i64,
    pub nombre: String,
    pub numero_identificacion: i64,
    pub precio_compra: f64,
    pub nota: Option<String>,
    pub id_finca: Option<i64>,
    pub id_informacion_veterinaria: Option<i64>,
    pub id_estado_salud: Option<i32>,
    pub id_genero: Option<i32>,
    pub id_produccion: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

type CattleTuple = (
    i64,
    String,
    i64,
    f64,
    Option<String>,
    Option<i64>,
    Option<i64>,
    Option<i32>,
    Option<i32>,
    Option<i64>,
    OffsetDateTime,
    OffsetDateTime,
);

impl CattleRow {
    fn from_tuple(row: CattleTuple) -> Self {
        Self {
            id_ganado: row.0,
            nombre: row.1,
            numero_identificacion: row.2,
            precio_compra: row.3,
            nota: row.4,
            id_finca: row.5,
            id_informacion_veterinaria: row.6,
            id_estado_salud: row.7,
            id_genero: row.8,
            id_produccion: row.9,
            created_at: row.10,
            updated_at: row.11,
        }
    }
}

/// Cattle record with its farm embedded.
#[derive(Debug, Clone, Serialize)]
pub struct CattleWithFarmRow {
    #[serde(flatten)]
    pub cattle: CattleRow,
    pub finca: Option<FarmRow>,
}

/// Fields for creating a cattle record.
#[derive(Debug, Clone, Default)]
pub struct NewCattle {
    pub nombre: String,
    pub numero_identificacion: Option<i64>,
    pub precio_compra: Option<f64>,
    pub nota: Option<String>,
    pub id_finca: Option<i64>,
    pub id_informacion_veterinaria: Option<i64>,
    pub id_estado_salud: Option<i32>,
    pub id_genero: Option<i32>,
    pub id_produccion: Option<i64>,
}

/// Partial cattle update; `None` fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct UpdateCattle {
    pub nombre: Option<String>,
    pub numero_identificacion: Option<i64>,
    pub precio_compra: Option<f64>,
    pub nota: Option<String>,
    pub id_finca: Option<i64>,
    pub id_informacion_veterinaria: Option<i64>,
    pub id_estado_salud: Option<i32>,
    pub id_genero: Option<i32>,
    pub id_produccion: Option<i64>,
}

// =============================================================================
// Cattle Storage
// =============================================================================

/// Cattle storage operations.
pub struct CattleStorage<'a> {
    pool: &'a PgPool,
}

const CATTLE_COLUMNS: &str = "id_ganado, nombre, numero_identificacion, precio_compra, nota, \
     id_finca, id_informacion_veterinaria, id_estado_salud, id_genero, id_produccion, \
     created_at, updated_at";

impl<'a> CattleStorage<'a> {
    /// Create a new cattle storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a cattle record. The id is assigned by the database sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create(&self, cattle: &NewCattle) -> StorageResult<CattleRow> {
        let sql = format!(
            r#"
            INSERT INTO ganado (nombre, numero_identificacion, precio_compra, nota,
                                id_finca, id_informacion_veterinaria, id_estado_salud,
                                id_genero, id_produccion, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW())
            RETURNING {CATTLE_COLUMNS}
            "#
        );
        let row: CattleTuple = query_as(&sql)
            .bind(&cattle.nombre)
            .bind(cattle.numero_identificacion.unwrap_or(0))
            .bind(cattle.precio_compra.unwrap_or(0.0))
            .bind(&cattle.nota)
            .bind(cattle.id_finca)
            .bind(cattle.id_informacion_veterinaria)
            .bind(cattle.id_estado_salud)
            .bind(cattle.id_genero)
            .bind(cattle.id_produccion)
            .fetch_one(self.pool)
            .await?;

        Ok(CattleRow::from_tuple(row))
    }

    /// Find a cattle record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: i64) -> StorageResult<Option<CattleRow>> {
        let sql = format!("SELECT {CATTLE_COLUMNS} FROM ganado WHERE id_ganado = $1");
        let row: Option<CattleTuple> = query_as(&sql).bind(id).fetch_optional(self.pool).await?;

        Ok(row.map(CattleRow::from_tuple))
    }

    /// Update a cattle record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn update(&self, id: i64, update: &UpdateCattle) -> StorageResult<Option<CattleRow>> {
        let sql = format!(
            r#"
            UPDATE ganado
            SET nombre = COALESCE($2, nombre),
                numero_identificacion = COALESCE($3, numero_identificacion),
                precio_compra = COALESCE($4, precio_compra),
                nota = COALESCE($5, nota),
                id_finca = COALESCE($6, id_finca),
                id_informacion_veterinaria = COALESCE($7, id_informacion_veterinaria),
                id_estado_salud = COALESCE($8, id_estado_salud),
                id_genero = COALESCE($9, id_genero),
                id_produccion = COALESCE($10, id_produccion),
                updated_at = NOW()
            WHERE id_ganado = $1
            RETURNING {CATTLE_COLUMNS}
            "#
        );
        let row: Option<CattleTuple> = query_as(&sql)
            .bind(id)
            .bind(&update.nombre)
            .bind(update.numero_identificacion)
            .bind(update.precio_compra)
            .bind(&update.nota)
            .bind(update.id_finca)
            .bind(update.id_informacion_veterinaria)
            .bind(update.id_estado_salud)
            .bind(update.id_genero)
            .bind(update.id_produccion)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(CattleRow::from_tuple))
    }

    /// Delete a cattle record. Returns whether a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete(&self, id: i64) -> StorageResult<bool> {
        let result = query(r#"DELETE FROM ganado WHERE id_ganado = $1"#)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List all cattle.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> StorageResult<Vec<CattleRow>> {
        let sql = format!("SELECT {CATTLE_COLUMNS} FROM ganado ORDER BY id_ganado");
        let rows: Vec<CattleTuple> = query_as(&sql).fetch_all(self.pool).await?;

        Ok(rows.into_iter().map(CattleRow::from_tuple).collect())
    }

    /// List cattle belonging to a farm.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_farm(&self, id_finca: i64) -> StorageResult<Vec<CattleRow>> {
        let sql =
            format!("SELECT {CATTLE_COLUMNS} FROM ganado WHERE id_finca = $1 ORDER BY id_ganado");
        let rows: Vec<CattleTuple> = query_as(&sql).bind(id_finca).fetch_all(self.pool).await?;

        Ok(rows.into_iter().map(CattleRow::from_tuple).collect())
    }

    /// List all cattle with their farm embedded.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_with_farm(&self) -> StorageResult<Vec<CattleWithFarmRow>> {
        type WithFarmTuple = (
            i64,
            String,
            i64,
            f64,
            Option<String>,
            Option<i64>,
            Option<i64>,
            Option<i32>,
            Option<i32>,
            Option<i64>,
            OffsetDateTime,
            OffsetDateTime,
            Option<i64>,
            Option<String>,
            Option<f64>,
            Option<i64>,
        );

        let rows: Vec<WithFarmTuple> = query_as(
            r#"
            SELECT g.id_ganado, g.nombre, g.numero_identificacion, g.precio_compra, g.nota,
                   g.id_finca, g.id_informacion_veterinaria, g.id_estado_salud,
                   g.id_genero, g.id_produccion, g.created_at, g.updated_at,
                   f.id_finca, f.nombre, f.tamano, f.id_usuario
            FROM ganado g
            LEFT JOIN finca f ON f.id_finca = g.id_finca
            ORDER BY g.id_ganado
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let finca = match (row.12, row.13, row.14) {
                    (Some(id_finca), Some(nombre), Some(tamano)) => Some(FarmRow {
                        id_finca,
                        nombre,
                        tamano,
                        id_usuario: row.15,
                    }),
                    _ => None,
                };
                CattleWithFarmRow {
                    cattle: CattleRow::from_tuple((
                        row.0, row.1, row.2, row.3, row.4, row.5, row.6, row.7, row.8, row.9,
                        row.10, row.11,
                    )),
                    finca,
                }
            })
            .collect())
    }

    /// Point a cattle record at a veterinary record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn set_vet_record(&self, id_ganado: i64, id_record: i64) -> StorageResult<bool> {
        let result = query(
            r#"
            UPDATE ganado
            SET id_informacion_veterinaria = $2, updated_at = NOW()
            WHERE id_ganado = $1
            "#,
        )
        .bind(id_ganado)
        .bind(id_record)
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
    fn cattle_row_serializes_timestamps_as_rfc3339() {
        let row = CattleRow::from_tuple((
            1,
            "Lola".into(),
            1001,
            350.0,
            None,
            Some(42),
            None,
            None,
            None,
            None,
            datetime!(2025-06-01 12:00:00 UTC),
            datetime!(2025-06-02 12:00:00 UTC),
        ));
        let j = serde_json::to_value(&row).unwrap();
        assert_eq!(j["id_ganado"], 1);
        assert_eq!(j["created_at"], "2025-06-01T12:00:00Z");
        assert_eq!(j["id_finca"], 42);
    }

    #[test]
    fn with_farm_row_flattens_cattle() {
        let row = CattleWithFarmRow {
            cattle: CattleRow::from_tuple((
                2,
                "Pinta".into(),
                0,
                0.0,
                None,
                None,
                None,
                None,
                None,
                None,
                datetime!(2025-06-01 0:00:00 UTC),
                datetime!(2025-06-01 0:00:00 UTC),
            )),
            finca: None,
        };
        let j = serde_json::to_value(&row).unwrap();
        assert_eq!(j["id_ganado"], 2);
        assert!(j["finca"].is_null());
    }
}
