//! Link codes: short-lived invitation codes attaching workers and
//! veterinarians to a farm.
//!
//! Codes live only in process memory; a restart invalidates every
//! outstanding code. That is a documented property of the subsystem, not a
//! bug. Expiry is a lazy check on every access plus a periodic sweep task,
//! so there is no per-code timer to leak or cancel.
//!
//! Redemption marks the code reserved before its first await. A concurrent
//! redeem of the same code observes the reservation and fails; a failed
//! membership link un-reserves the code so the holder can retry.

pub mod pg;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rand::RngCore;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use cowtracker_core::{Clock, LinkRole};
use cowtracker_storage::{MembershipRow, StorageError, StorageResult};

pub use pg::{PgFarmLookup, PgMembershipLink};

/// Length of a link code: 3 random bytes, hex-encoded uppercase.
pub const CODE_LENGTH: usize = 6;

/// Collision-regeneration guard. The keyspace (16^6) makes collisions rare,
/// but the loop must be bounded rather than assumed to terminate.
const MAX_GENERATION_ATTEMPTS: usize = 64;

// =============================================================================
// Errors
// =============================================================================

/// Errors from the link-code subsystem, mirroring the API taxonomy.
#[derive(Debug, Error)]
pub enum LinkCodeError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    /// Datastore failures propagate verbatim.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

// =============================================================================
// Collaborators
// =============================================================================

/// Farm existence check, backed by the datastore in production.
#[async_trait]
pub trait FarmLookup: Send + Sync {
    async fn farm_exists(&self, id_finca: i64) -> StorageResult<bool>;
}

/// A user eligible for linking.
#[derive(Debug, Clone)]
pub struct LinkedUser {
    pub id_usuario: i64,
    pub id_rol: i32,
}

/// User lookup and membership creation, backed by the datastore in
/// production.
#[async_trait]
pub trait MembershipLink: Send + Sync {
    /// Resolve the redeeming user by identity-provider id.
    async fn find_user(&self, auth_id: Uuid) -> StorageResult<Option<LinkedUser>>;

    /// Create (or keep) the user-farm membership.
    async fn link(&self, id_usuario: i64, id_finca: i64) -> StorageResult<MembershipRow>;
}

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodeState {
    Active,
    /// A redemption is in flight; the code is invisible to other redeemers.
    Reserved,
}

#[derive(Debug, Clone)]
struct CodeEntry {
    id_finca: i64,
    tipo: LinkRole,
    created_at: OffsetDateTime,
    expires_at: OffsetDateTime,
    state: CodeState,
}

/// A freshly issued code, serialized with the wire field names.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedCode {
    pub codigo: String,
    #[serde(rename = "idFinca")]
    pub id_finca: i64,
    pub tipo: LinkRole,
    #[serde(rename = "expiraEn", with = "time::serde::rfc3339")]
    pub expira_en: OffsetDateTime,
}

/// A live code as listed for a farm administrator. The full code value is
/// intentionally included: the lister is the code's issuer.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveCode {
    pub codigo: String,
    pub tipo: LinkRole,
    #[serde(rename = "creado", with = "time::serde::rfc3339")]
    pub creado: OffsetDateTime,
    #[serde(rename = "expira", with = "time::serde::rfc3339")]
    pub expira: OffsetDateTime,
}

/// The result of a successful redemption.
#[derive(Debug, Serialize)]
pub struct Redemption {
    #[serde(rename = "idUsuario")]
    pub id_usuario: i64,
    #[serde(rename = "idFinca")]
    pub id_finca: i64,
    pub tipo: LinkRole,
    pub vinculacion: MembershipRow,
}

// =============================================================================
// Service
// =============================================================================

/// Owner of the in-memory code store.
///
/// Constructed once at startup and shared behind an `Arc`; request handlers
/// and the sweep task all operate on the same instance.
pub struct LinkCodeService {
    codes: DashMap<String, CodeEntry>,
    farms: Arc<dyn FarmLookup>,
    memberships: Arc<dyn MembershipLink>,
    clock: Arc<dyn Clock>,
    default_duration: Duration,
}

impl LinkCodeService {
    pub fn new(
        farms: Arc<dyn FarmLookup>,
        memberships: Arc<dyn MembershipLink>,
        clock: Arc<dyn Clock>,
        default_duration: Duration,
    ) -> Self {
        Self {
            codes: DashMap::new(),
            farms,
            memberships,
            clock,
            default_duration,
        }
    }

    /// Issue a code scoping `(id_finca, tipo)`, valid for `duracion_minutos`
    /// (default when `None`).
    ///
    /// # Errors
    ///
    /// `NotFound` if the farm does not exist, `InvalidArgument` for a
    /// non-positive duration, `Conflict` if a unique code cannot be
    /// generated, and datastore errors verbatim.
    pub async fn issue(
        &self,
        id_finca: i64,
        tipo: LinkRole,
        duracion_minutos: Option<i64>,
    ) -> Result<IssuedCode, LinkCodeError> {
        let duration = match duracion_minutos {
            Some(minutes) if minutes <= 0 => {
                return Err(LinkCodeError::InvalidArgument(
                    "duracionMinutos debe ser mayor que cero".into(),
                ));
            }
            Some(minutes) => Duration::from_secs(minutes as u64 * 60),
            None => self.default_duration,
        };

        if !self.farms.farm_exists(id_finca).await? {
            return Err(LinkCodeError::NotFound(format!(
                "La finca con ID {id_finca} no existe"
            )));
        }

        let created_at = self.clock.now_utc();
        let expires_at = created_at + duration;

        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let codigo = generate_code();
            match self.codes.entry(codigo.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    slot.insert(CodeEntry {
                        id_finca,
                        tipo,
                        created_at,
                        expires_at,
                        state: CodeState::Active,
                    });
                    tracing::info!(codigo = %codigo, id_finca, tipo = %tipo, "link code issued");
                    return Ok(IssuedCode {
                        codigo,
                        id_finca,
                        tipo,
                        expira_en: expires_at,
                    });
                }
            }
        }

        Err(LinkCodeError::Conflict(
            "No fue posible generar un código único".into(),
        ))
    }

    /// Redeem a code for the given identity-provider account.
    ///
    /// On success the membership link is created first and the code is
    /// removed after; if the link fails the code is un-reserved so the
    /// holder can retry.
    ///
    /// # Errors
    ///
    /// `NotFound` for an absent, expired, or mid-redemption code (and for a
    /// missing user), `Forbidden` for a role mismatch, and datastore errors
    /// verbatim.
    pub async fn redeem(&self, codigo: &str, auth_id: Uuid) -> Result<Redemption, LinkCodeError> {
        let now = self.clock.now_utc();

        // Reserve synchronously; no await between lookup and reservation.
        let (id_finca, tipo) = {
            let mut entry = self.codes.get_mut(codigo).ok_or_else(invalid_code)?;

            if entry.expires_at <= now {
                drop(entry);
                self.codes.remove(codigo);
                return Err(LinkCodeError::NotFound(
                    "Código de vinculación expirado".into(),
                ));
            }
            if entry.state == CodeState::Reserved {
                return Err(invalid_code());
            }
            entry.state = CodeState::Reserved;
            (entry.id_finca, entry.tipo)
        };

        let user = match self.memberships.find_user(auth_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.unreserve(codigo);
                return Err(LinkCodeError::NotFound("Usuario no encontrado".into()));
            }
            Err(e) => {
                self.unreserve(codigo);
                return Err(e.into());
            }
        };

        if user.id_rol != tipo.required_role_id() {
            self.unreserve(codigo);
            return Err(LinkCodeError::Forbidden(format!(
                "El usuario no tiene el rol de {tipo} requerido para esta vinculación"
            )));
        }

        // Redemption is complete only once the link is durably created;
        // until then the code must survive for a retry.
        let vinculacion = match self.memberships.link(user.id_usuario, id_finca).await {
            Ok(row) => row,
            Err(e) => {
                self.unreserve(codigo);
                return Err(e.into());
            }
        };

        self.codes.remove(codigo);
        tracing::info!(codigo = %codigo, id_finca, id_usuario = user.id_usuario, "link code redeemed");

        Ok(Redemption {
            id_usuario: user.id_usuario,
            id_finca,
            tipo,
            vinculacion,
        })
    }

    /// List the live, unexpired codes of a farm.
    pub fn list_active(&self, id_finca: i64) -> Vec<ActiveCode> {
        let now = self.clock.now_utc();
        let mut codes: Vec<ActiveCode> = self
            .codes
            .iter()
            .filter(|entry| entry.id_finca == id_finca && entry.expires_at > now)
            .map(|entry| ActiveCode {
                codigo: entry.key().clone(),
                tipo: entry.tipo,
                creado: entry.created_at,
                expira: entry.expires_at,
            })
            .collect();
        codes.sort_by_key(|code| code.creado);
        codes
    }

    /// Delete a code if it exists and belongs to the given farm. Returns
    /// whether a deletion occurred.
    pub fn revoke(&self, codigo: &str, id_finca: i64) -> bool {
        self.codes
            .remove_if(codigo, |_, entry| entry.id_finca == id_finca)
            .is_some()
    }

    /// Remove expired codes. Reserved entries are skipped: an in-flight
    /// redemption owns their lifecycle.
    pub fn sweep(&self) {
        let now = self.clock.now_utc();
        let before = self.codes.len();
        self.codes
            .retain(|_, entry| entry.state == CodeState::Reserved || entry.expires_at > now);
        let removed = before - self.codes.len();
        if removed > 0 {
            tracing::debug!(removed, "expired link codes swept");
        }
    }

    /// Number of stored codes, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    fn unreserve(&self, codigo: &str) {
        if let Some(mut entry) = self.codes.get_mut(codigo)
            && entry.state == CodeState::Reserved
        {
            entry.state = CodeState::Active;
        }
    }
}

/// Spawn the periodic sweep task for a shared service instance.
pub fn spawn_sweeper(service: Arc<LinkCodeService>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            service.sweep();
        }
    })
}

fn invalid_code() -> LinkCodeError {
    LinkCodeError::NotFound("Código de vinculación inválido o expirado".into())
}

/// Generate a candidate code: 3 random bytes, hex-encoded uppercase.
fn generate_code() -> String {
    let mut bytes = [0u8; 3];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut code = hex::encode(bytes).to_uppercase();
    code.truncate(CODE_LENGTH);
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_six_uppercase_hex_chars() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(
                code.chars()
                    .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)),
                "unexpected char in {code}"
            );
        }
    }
}
