//! Sale storage (`venta`) and the sale-cattle link table (`venta_ganado`).

use serde::Serialize;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;

use crate::cattle::CattleRow;
use crate::{PgPool, StorageResult};

// =============================================================================
// Types
// =============================================================================

/// Sale record from the `venta` table.
#[derive(Debug, Clone, Serialize)]
pub struct SaleRow {
    pub id_venta: i64,
    pub comprador: String,
    pub cantidad: i32,
    pub precio_unitario: f64,
    pub total: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

type SaleTuple = (i64, String, i32, f64, f64, OffsetDateTime, OffsetDateTime);

impl SaleRow {
    fn from_tuple(row: SaleTuple) -> Self {
        Self {
            id_venta: row.0,
            comprador: row.1,
            cantidad: row.2,
            precio_unitario: row.3,
            total: row.4,
            created_at: row.5,
            updated_at: row.6,
        }
    }
}

/// Fields for creating a sale.
#[derive(Debug, Clone)]
pub struct NewSale {
    pub comprador: String,
    pub cantidad: i32,
    pub precio_unitario: f64,
    pub total: f64,
}

/// Partial sale update; `None` fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct UpdateSale {
    pub comprador: Option<String>,
    pub cantidad: Option<i32>,
    pub precio_unitario: Option<f64>,
    pub total: Option<f64>,
}

/// A sale-cattle link with the cattle record embedded.
#[derive(Debug, Clone, Serialize)]
pub struct SaleCattleRow {
    pub id_venta_ganado: i64,
    pub id_venta: i64,
    pub id_ganado: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ganado: Option<CattleRow>,
}

/// Aggregated sales statistics, serialized with the original wire names.
#[derive(Debug, Clone, Serialize)]
pub struct SaleStats {
    #[serde(rename = "totalVentas")]
    pub total_ventas: i64,
    #[serde(rename = "totalIngresos")]
    pub total_ingresos: f64,
    #[serde(rename = "totalAnimalesVendidos")]
    pub total_animales_vendidos: i64,
    #[serde(rename = "promedioVenta")]
    pub promedio_venta: f64,
}

// =============================================================================
// Sale Storage
// =============================================================================

/// Sale storage operations.
pub struct SaleStorage<'a> {
    pool: &'a PgPool,
}

const SALE_COLUMNS: &str =
    "id_venta, comprador, cantidad, precio_unitario, total, created_at, updated_at";

impl<'a> SaleStorage<'a> {
    /// Create a new sale storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a sale.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create(&self, sale: &NewSale) -> StorageResult<SaleRow> {
        let sql = format!(
            r#"
            INSERT INTO venta (comprador, cantidad, precio_unitario, total, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            RETURNING {SALE_COLUMNS}
            "#
        );
        let row: SaleTuple = query_as(&sql)
            .bind(&sale.comprador)
            .bind(sale.cantidad)
            .bind(sale.precio_unitario)
            .bind(sale.total)
            .fetch_one(self.pool)
            .await?;

        Ok(SaleRow::from_tuple(row))
    }

    /// Find a sale by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: i64) -> StorageResult<Option<SaleRow>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM venta WHERE id_venta = $1");
        let row: Option<SaleTuple> = query_as(&sql).bind(id).fetch_optional(self.pool).await?;

        Ok(row.map(SaleRow::from_tuple))
    }

    /// Update a sale.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn update(&self, id: i64, update: &UpdateSale) -> StorageResult<Option<SaleRow>> {
        let sql = format!(
            r#"
            UPDATE venta
            SET comprador = COALESCE($2, comprador),
                cantidad = COALESCE($3, cantidad),
                precio_unitario = COALESCE($4, precio_unitario),
                total = COALESCE($5, total),
                updated_at = NOW()
            WHERE id_venta = $1
            RETURNING {SALE_COLUMNS}
            "#
        );
        let row: Option<SaleTuple> = query_as(&sql)
            .bind(id)
            .bind(&update.comprador)
            .bind(update.cantidad)
            .bind(update.precio_unitario)
            .bind(update.total)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(SaleRow::from_tuple))
    }

    /// Delete a sale. Returns whether a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete(&self, id: i64) -> StorageResult<bool> {
        let result = query(r#"DELETE FROM venta WHERE id_venta = $1"#)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List all sales, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> StorageResult<Vec<SaleRow>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM venta ORDER BY created_at DESC");
        let rows: Vec<SaleTuple> = query_as(&sql).fetch_all(self.pool).await?;

        Ok(rows.into_iter().map(SaleRow::from_tuple).collect())
    }

    /// List sales whose buyer matches (case-insensitive substring).
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_buyer(&self, comprador: &str) -> StorageResult<Vec<SaleRow>> {
        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM venta WHERE comprador ILIKE $1 ORDER BY created_at DESC"
        );
        let rows: Vec<SaleTuple> = query_as(&sql)
            .bind(format!("%{comprador}%"))
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(SaleRow::from_tuple).collect())
    }

    /// Aggregate sales statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn stats(&self) -> StorageResult<SaleStats> {
        let row: (i64, f64, i64) = query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(total), 0)::float8,
                   COALESCE(SUM(cantidad), 0)::int8
            FROM venta
            "#,
        )
        .fetch_one(self.pool)
        .await?;

        let (total_ventas, total_ingresos, total_animales_vendidos) = row;
        let promedio_venta = if total_ventas > 0 {
            total_ingresos / total_ventas as f64
        } else {
            0.0
        };

        Ok(SaleStats {
            total_ventas,
            total_ingresos,
            total_animales_vendidos,
            promedio_venta,
        })
    }

    // -------------------------------------------------------------------------
    // Sale-cattle links
    // -------------------------------------------------------------------------

    /// Link a cattle record to a sale.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn link_cattle(&self, id_venta: i64, id_ganado: i64) -> StorageResult<SaleCattleRow> {
        let row: (i64, i64, i64) = query_as(
            r#"
            INSERT INTO venta_ganado (id_venta, id_ganado)
            VALUES ($1, $2)
            RETURNING id_venta_ganado, id_venta, id_ganado
            "#,
        )
        .bind(id_venta)
        .bind(id_ganado)
        .fetch_one(self.pool)
        .await?;

        Ok(SaleCattleRow {
            id_venta_ganado: row.0,
            id_venta: row.1,
            id_ganado: row.2,
            ganado: None,
        })
    }

    /// List the cattle linked to a sale, each with the cattle row embedded.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn cattle_for_sale(&self, id_venta: i64) -> StorageResult<Vec<SaleCattleRow>> {
        type LinkTuple = (
            i64,
            i64,
            i64,
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

        let rows: Vec<LinkTuple> = query_as(
            r#"
            SELECT vg.id_venta_ganado, vg.id_venta, vg.id_ganado,
                   g.id_ganado, g.nombre, g.numero_identificacion, g.precio_compra, g.nota,
                   g.id_finca, g.id_informacion_veterinaria, g.id_estado_salud,
                   g.id_genero, g.id_produccion, g.created_at, g.updated_at
            FROM venta_ganado vg
            JOIN ganado g ON g.id_ganado = vg.id_ganado
            WHERE vg.id_venta = $1
            ORDER BY vg.id_venta_ganado
            "#,
        )
        .bind(id_venta)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SaleCattleRow {
                id_venta_ganado: row.0,
                id_venta: row.1,
                id_ganado: row.2,
                ganado: Some(CattleRow {
                    id_ganado: row.3,
                    nombre: row.4,
                    numero_identificacion: row.5,
                    precio_compra: row.6,
                    nota: row.7,
                    id_finca: row.8,
                    id_informacion_veterinaria: row.9,
                    id_estado_salud: row.10,
                    id_genero: row.11,
                    id_produccion: row.12,
                    created_at: row.13,
                    updated_at: row.14,
                }),
            })
            .collect())
    }

    /// Remove every cattle link from a sale. Returns the number of rows
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn unlink_all_cattle(&self, id_venta: i64) -> StorageResult<u64> {
        let result = query(r#"DELETE FROM venta_ganado WHERE id_venta = $1"#)
            .bind(id_venta)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_serialize_with_wire_names() {
        let stats = SaleStats {
            total_ventas: 4,
            total_ingresos: 1200.0,
            total_animales_vendidos: 10,
            promedio_venta: 300.0,
        };
        let j = serde_json::to_value(&stats).unwrap();
        assert_eq!(j["totalVentas"], 4);
        assert_eq!(j["totalIngresos"], 1200.0);
        assert_eq!(j["totalAnimalesVendidos"], 10);
        assert_eq!(j["promedioVenta"], 300.0);
    }
}
