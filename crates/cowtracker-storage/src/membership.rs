//! Farm membership storage (`usuario_finca`).
//!
//! A membership row links a user to a farm. Memberships are created either
//! directly (association endpoint) or through link-code redemption.

use serde::Serialize;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use uuid::Uuid;

use crate::farm::FarmRow;
use crate::{PgPool, StorageResult};

// =============================================================================
// Types
// =============================================================================

/// Membership record from the `usuario_finca` table.
#[derive(Debug, Clone, Serialize)]
pub struct MembershipRow {
    pub id_usuario_finca: i64,
    pub id_usuario: i64,
    pub id_finca: i64,
}

type MembershipTuple = (i64, i64, i64);

impl MembershipRow {
    fn from_tuple(row: MembershipTuple) -> Self {
        Self {
            id_usuario_finca: row.0,
            id_usuario: row.1,
            id_finca: row.2,
        }
    }
}

/// A farm member with identity and role details, as listed per farm.
#[derive(Debug, Clone, Serialize)]
pub struct FarmMemberRow {
    pub id_usuario: i64,
    pub primer_nombre: String,
    pub segundo_nombre: Option<String>,
    pub primer_apellido: String,
    pub segundo_apellido: Option<String>,
    pub id_autentificar: Uuid,
    pub id_rol: i32,
    pub correo: Option<String>,
    pub nombre_completo: String,
}

type FarmMemberTuple = (
    i64,
    String,
    Option<String>,
    String,
    Option<String>,
    Uuid,
    i32,
    Option<String>,
);

impl FarmMemberRow {
    fn from_tuple(row: FarmMemberTuple) -> Self {
        let nombre_completo = format!("{} {}", row.1, row.3);
        Self {
            id_usuario: row.0,
            primer_nombre: row.1,
            segundo_nombre: row.2,
            primer_apellido: row.3,
            segundo_apellido: row.4,
            id_autentificar: row.5,
            id_rol: row.6,
            correo: row.7,
            nombre_completo,
        }
    }
}

// =============================================================================
// Membership Storage
// =============================================================================

/// Farm membership storage operations.
pub struct MembershipStorage<'a> {
    pool: &'a PgPool,
}

const MEMBER_SELECT: &str = r#"
    SELECT u.id_usuario, u.primer_nombre, u.segundo_nombre,
           u.primer_apellido, u.segundo_apellido, u.id_autentificar,
           u.id_rol, a.correo
    FROM usuario_finca uf
    JOIN usuario u ON u.id_usuario = uf.id_usuario
    LEFT JOIN autentificar a ON a.id_autentificar = u.id_autentificar
"#;

impl<'a> MembershipStorage<'a> {
    /// Create a new membership storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create (or keep) the membership link between a user and a farm.
    ///
    /// Idempotent: redeeming a second code for the same farm, or associating
    /// twice, returns the existing row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database upsert fails.
    pub async fn upsert(&self, id_usuario: i64, id_finca: i64) -> StorageResult<MembershipRow> {
        let row: MembershipTuple = query_as(
            r#"
            INSERT INTO usuario_finca (id_usuario, id_finca)
            VALUES ($1, $2)
            ON CONFLICT (id_usuario, id_finca)
                DO UPDATE SET id_finca = EXCLUDED.id_finca
            RETURNING id_usuario_finca, id_usuario, id_finca
            "#,
        )
        .bind(id_usuario)
        .bind(id_finca)
        .fetch_one(self.pool)
        .await?;

        tracing::debug!(id_usuario, id_finca, "membership upserted");

        Ok(MembershipRow::from_tuple(row))
    }

    /// Remove the membership link. Returns whether a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn remove(&self, id_usuario: i64, id_finca: i64) -> StorageResult<bool> {
        let result = query(
            r#"
            DELETE FROM usuario_finca
            WHERE id_usuario = $1 AND id_finca = $2
            "#,
        )
        .bind(id_usuario)
        .bind(id_finca)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List all farms a user belongs to.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn farms_by_user(&self, id_usuario: i64) -> StorageResult<Vec<FarmRow>> {
        let rows: Vec<(i64, String, f64, Option<i64>)> = query_as(
            r#"
            SELECT f.id_finca, f.nombre, f.tamano, f.id_usuario
            FROM usuario_finca uf
            JOIN finca f ON f.id_finca = uf.id_finca
            WHERE uf.id_usuario = $1
            ORDER BY f.id_finca
            "#,
        )
        .bind(id_usuario)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id_finca, nombre, tamano, id_usuario)| FarmRow {
                id_finca,
                nombre,
                tamano,
                id_usuario,
            })
            .collect())
    }

    /// List all members of a farm.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn users_by_farm(&self, id_finca: i64) -> StorageResult<Vec<FarmMemberRow>> {
        let sql = format!("{MEMBER_SELECT} WHERE uf.id_finca = $1 ORDER BY u.id_usuario");
        let rows: Vec<FarmMemberTuple> = query_as(&sql)
            .bind(id_finca)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(FarmMemberRow::from_tuple).collect())
    }

    /// List the members of a farm holding a specific role.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn members_by_farm_role(
        &self,
        id_finca: i64,
        id_rol: i32,
    ) -> StorageResult<Vec<FarmMemberRow>> {
        let sql = format!(
            "{MEMBER_SELECT} WHERE uf.id_finca = $1 AND u.id_rol = $2 ORDER BY u.id_usuario"
        );
        let rows: Vec<FarmMemberTuple> = query_as(&sql)
            .bind(id_finca)
            .bind(id_rol)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(FarmMemberRow::from_tuple).collect())
    }

    /// List a farm's owners (the user recorded on the `finca` row).
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn owners_by_farm(&self, id_finca: i64) -> StorageResult<Vec<FarmMemberRow>> {
        let rows: Vec<FarmMemberTuple> = query_as(
            r#"
            SELECT u.id_usuario, u.primer_nombre, u.segundo_nombre,
                   u.primer_apellido, u.segundo_apellido, u.id_autentificar,
                   u.id_rol, a.correo
            FROM finca f
            JOIN usuario u ON u.id_usuario = f.id_usuario
            LEFT JOIN autentificar a ON a.id_autentificar = u.id_autentificar
            WHERE f.id_finca = $1
            "#,
        )
        .bind(id_finca)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(FarmMemberRow::from_tuple).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_row_builds_full_name() {
        let row = FarmMemberRow::from_tuple((
            3,
            "Luis".into(),
            None,
            "Mora".into(),
            None,
            Uuid::nil(),
            2,
            Some("luis@example.com".into()),
        ));
        assert_eq!(row.nombre_completo, "Luis Mora");
    }
}
