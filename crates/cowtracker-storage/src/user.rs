//! User storage.
//!
//! User profiles live in `usuario`, keyed to the identity provider through
//! `id_autentificar`. The `autentificar` table mirrors the provider's
//! account (email); `rol` and `premium` are lookup tables.

use serde::Serialize;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use uuid::Uuid;

use crate::{PgPool, StorageError, StorageResult};

// =============================================================================
// Types
// =============================================================================

/// User record from the `usuario` table.
#[derive(Debug, Clone, Serialize)]
pub struct UserRow {
    pub id_usuario: i64,
    pub primer_nombre: String,
    pub segundo_nombre: Option<String>,
    pub primer_apellido: String,
    pub segundo_apellido: Option<String>,
    pub id_autentificar: Uuid,
    pub id_rol: i32,
    pub id_premium: i32,
}

type UserTuple = (
    i64,
    String,
    Option<String>,
    String,
    Option<String>,
    Uuid,
    i32,
    i32,
);

impl UserRow {
    fn from_tuple(row: UserTuple) -> Self {
        Self {
            id_usuario: row.0,
            primer_nombre: row.1,
            segundo_nombre: row.2,
            primer_apellido: row.3,
            segundo_apellido: row.4,
            id_autentificar: row.5,
            id_rol: row.6,
            id_premium: row.7,
        }
    }
}

/// User record joined with role, premium tier, and account email.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfileRow {
    #[serde(flatten)]
    pub user: UserRow,
    pub correo: Option<String>,
    pub rol_descripcion: Option<String>,
    pub premium_descripcion: Option<String>,
}

type UserProfileTuple = (
    i64,
    String,
    Option<String>,
    String,
    Option<String>,
    Uuid,
    i32,
    i32,
    Option<String>,
    Option<String>,
    Option<String>,
);

impl UserProfileRow {
    fn from_tuple(row: UserProfileTuple) -> Self {
        Self {
            user: UserRow {
                id_usuario: row.0,
                primer_nombre: row.1,
                segundo_nombre: row.2,
                primer_apellido: row.3,
                segundo_apellido: row.4,
                id_autentificar: row.5,
                id_rol: row.6,
                id_premium: row.7,
            },
            correo: row.8,
            rol_descripcion: row.9,
            premium_descripcion: row.10,
        }
    }
}

/// Fields required to create a user profile.
#[derive(Debug, Clone)]
pub struct NewUserProfile {
    pub id_autentificar: Uuid,
    pub correo: String,
    pub primer_nombre: String,
    pub segundo_nombre: Option<String>,
    pub primer_apellido: String,
    pub segundo_apellido: Option<String>,
    pub id_rol: i32,
    pub id_premium: i32,
}

/// Partial profile update; `None` fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct UpdateUserProfile {
    pub primer_nombre: Option<String>,
    pub segundo_nombre: Option<String>,
    pub primer_apellido: Option<String>,
    pub segundo_apellido: Option<String>,
    pub id_premium: Option<i32>,
}

// =============================================================================
// User Storage
// =============================================================================

/// User storage operations.
pub struct UserStorage<'a> {
    pool: &'a PgPool,
}

const PROFILE_SELECT: &str = r#"
    SELECT u.id_usuario, u.primer_nombre, u.segundo_nombre,
           u.primer_apellido, u.segundo_apellido, u.id_autentificar,
           u.id_rol, u.id_premium,
           a.correo, r.descripcion, p.descripcion
    FROM usuario u
    LEFT JOIN autentificar a ON a.id_autentificar = u.id_autentificar
    LEFT JOIN rol r ON r.id_rol = u.id_rol
    LEFT JOIN premium p ON p.id_premium = u.id_premium
"#;

impl<'a> UserStorage<'a> {
    /// Create a new user storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find a user profile by its identity-provider id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_auth_id(&self, auth_id: Uuid) -> StorageResult<Option<UserProfileRow>> {
        let sql = format!("{PROFILE_SELECT} WHERE u.id_autentificar = $1");
        let row: Option<UserProfileTuple> = query_as(&sql)
            .bind(auth_id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(UserProfileRow::from_tuple))
    }

    /// Find a user by its numeric id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: i64) -> StorageResult<Option<UserRow>> {
        let row: Option<UserTuple> = query_as(
            r#"
            SELECT id_usuario, primer_nombre, segundo_nombre,
                   primer_apellido, segundo_apellido, id_autentificar,
                   id_rol, id_premium
            FROM usuario
            WHERE id_usuario = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(UserRow::from_tuple))
    }

    /// Create a user profile, making sure the mirrored `autentificar` row
    /// exists first.
    ///
    /// # Errors
    ///
    /// Returns a `Conflict` error if a profile for this account already
    /// exists, or the underlying error for other failures.
    pub async fn create_profile(&self, profile: &NewUserProfile) -> StorageResult<UserRow> {
        query(
            r#"
            INSERT INTO autentificar (id_autentificar, correo, contrasena)
            VALUES ($1, $2, '')
            ON CONFLICT (id_autentificar) DO NOTHING
            "#,
        )
        .bind(profile.id_autentificar)
        .bind(&profile.correo)
        .execute(self.pool)
        .await?;

        let row: UserTuple = query_as(
            r#"
            INSERT INTO usuario (primer_nombre, segundo_nombre, primer_apellido,
                                 segundo_apellido, id_autentificar, id_rol, id_premium)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id_usuario, primer_nombre, segundo_nombre,
                      primer_apellido, segundo_apellido, id_autentificar,
                      id_rol, id_premium
            "#,
        )
        .bind(&profile.primer_nombre)
        .bind(&profile.segundo_nombre)
        .bind(&profile.primer_apellido)
        .bind(&profile.segundo_apellido)
        .bind(profile.id_autentificar)
        .bind(profile.id_rol)
        .bind(profile.id_premium)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx_core::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StorageError::conflict("El usuario ya está registrado");
            }
            StorageError::from(e)
        })?;

        Ok(UserRow::from_tuple(row))
    }

    /// Update a user profile by identity-provider id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn update_profile(
        &self,
        auth_id: Uuid,
        update: &UpdateUserProfile,
    ) -> StorageResult<Option<UserRow>> {
        let row: Option<UserTuple> = query_as(
            r#"
            UPDATE usuario
            SET primer_nombre = COALESCE($2, primer_nombre),
                segundo_nombre = COALESCE($3, segundo_nombre),
                primer_apellido = COALESCE($4, primer_apellido),
                segundo_apellido = COALESCE($5, segundo_apellido),
                id_premium = COALESCE($6, id_premium)
            WHERE id_autentificar = $1
            RETURNING id_usuario, primer_nombre, segundo_nombre,
                      primer_apellido, segundo_apellido, id_autentificar,
                      id_rol, id_premium
            "#,
        )
        .bind(auth_id)
        .bind(&update.primer_nombre)
        .bind(&update.segundo_nombre)
        .bind(&update.primer_apellido)
        .bind(&update.segundo_apellido)
        .bind(update.id_premium)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(UserRow::from_tuple))
    }

    /// Change a user's role by identity-provider id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn change_role(&self, auth_id: Uuid, id_rol: i32) -> StorageResult<Option<UserRow>> {
        let row: Option<UserTuple> = query_as(
            r#"
            UPDATE usuario
            SET id_rol = $2
            WHERE id_autentificar = $1
            RETURNING id_usuario, primer_nombre, segundo_nombre,
                      primer_apellido, segundo_apellido, id_autentificar,
                      id_rol, id_premium
            "#,
        )
        .bind(auth_id)
        .bind(id_rol)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(UserRow::from_tuple))
    }

    /// Set a user's premium tier by identity-provider id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn set_premium(
        &self,
        auth_id: Uuid,
        id_premium: i32,
    ) -> StorageResult<Option<UserRow>> {
        let row: Option<UserTuple> = query_as(
            r#"
            UPDATE usuario
            SET id_premium = $2
            WHERE id_autentificar = $1
            RETURNING id_usuario, primer_nombre, segundo_nombre,
                      primer_apellido, segundo_apellido, id_autentificar,
                      id_rol, id_premium
            "#,
        )
        .bind(auth_id)
        .bind(id_premium)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(UserRow::from_tuple))
    }

    /// Delete a user profile by identity-provider id. Returns whether a row
    /// was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete(&self, auth_id: Uuid) -> StorageResult<bool> {
        let result = query(r#"DELETE FROM usuario WHERE id_autentificar = $1"#)
            .bind(auth_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List all user profiles.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> StorageResult<Vec<UserProfileRow>> {
        let sql = format!("{PROFILE_SELECT} ORDER BY u.id_usuario");
        let rows: Vec<UserProfileTuple> = query_as(&sql).fetch_all(self.pool).await?;

        Ok(rows.into_iter().map(UserProfileRow::from_tuple).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_row_flattens_user_fields() {
        let row = UserProfileRow {
            user: UserRow {
                id_usuario: 9,
                primer_nombre: "Ana".into(),
                segundo_nombre: None,
                primer_apellido: "Rojas".into(),
                segundo_apellido: None,
                id_autentificar: Uuid::nil(),
                id_rol: 2,
                id_premium: 1,
            },
            correo: Some("ana@example.com".into()),
            rol_descripcion: Some("trabajador".into()),
            premium_descripcion: Some("Free".into()),
        };
        let j = serde_json::to_value(&row).unwrap();
        assert_eq!(j["id_usuario"], 9);
        assert_eq!(j["correo"], "ana@example.com");
        assert_eq!(j["id_rol"], 2);
    }
}
