//! Postgres-backed collaborators for the link-code service.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use cowtracker_storage::{
    FarmStorage, MembershipRow, MembershipStorage, PgPool, StorageResult, UserStorage,
};

use super::{FarmLookup, LinkedUser, MembershipLink};

/// Farm existence checks against the `finca` table.
#[derive(Clone)]
pub struct PgFarmLookup {
    pool: Arc<PgPool>,
}

impl PgFarmLookup {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FarmLookup for PgFarmLookup {
    async fn farm_exists(&self, id_finca: i64) -> StorageResult<bool> {
        FarmStorage::new(&self.pool).exists(id_finca).await
    }
}

/// User resolution and membership upserts against `usuario`/`usuario_finca`.
#[derive(Clone)]
pub struct PgMembershipLink {
    pool: Arc<PgPool>,
}

impl PgMembershipLink {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipLink for PgMembershipLink {
    async fn find_user(&self, auth_id: Uuid) -> StorageResult<Option<LinkedUser>> {
        let profile = UserStorage::new(&self.pool).find_by_auth_id(auth_id).await?;
        Ok(profile.map(|profile| LinkedUser {
            id_usuario: profile.user.id_usuario,
            id_rol: profile.user.id_rol,
        }))
    }

    async fn link(&self, id_usuario: i64, id_finca: i64) -> StorageResult<MembershipRow> {
        MembershipStorage::new(&self.pool)
            .upsert(id_usuario, id_finca)
            .await
    }
}
