//! PostgreSQL storage backend for CowTracker.
//!
//! One storage type per table, all operating on a shared connection pool:
//!
//! - Farms (`finca`)
//! - Users (`usuario` + `autentificar` + `rol` + `premium`)
//! - Farm memberships (`usuario_finca`)
//! - Cattle (`ganado`)
//! - Veterinary records (`informacion_veterinaria`)
//! - Medications (`medicamento`) and treatment links (`tratamiento_medicamento`)
//! - Sales (`venta` + `venta_ganado`)
//!
//! # Example
//!
//! ```ignore
//! use cowtracker_storage::CowtrackerStorage;
//!
//! let storage = CowtrackerStorage::connect("postgres://localhost/cowtracker").await?;
//! let farm = storage.farms().find_by_id(42).await?;
//! ```

pub mod cattle;
pub mod farm;
pub mod medication;
pub mod membership;
pub mod premium;
pub mod sale;
pub mod user;
pub mod vet_record;

use std::sync::Arc;

use sqlx_core::pool::Pool;
use sqlx_postgres::Postgres;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

pub use cattle::{CattleRow, CattleStorage, CattleWithFarmRow, NewCattle, UpdateCattle};
pub use farm::{FarmRow, FarmStorage};
pub use medication::{MedicationRow, MedicationStorage};
pub use membership::{FarmMemberRow, MembershipRow, MembershipStorage};
pub use premium::{PremiumRow, PremiumStorage};
pub use sale::{NewSale, SaleCattleRow, SaleRow, SaleStats, SaleStorage, UpdateSale};
pub use user::{NewUserProfile, UpdateUserProfile, UserProfileRow, UserRow, UserStorage};
pub use vet_record::{NewVetRecord, TreatmentMedicationRow, VetRecordRow, VetRecordStorage};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Requested row was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Row already exists (conflict).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl StorageError {
    /// Create a `NotFound` error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// Create a `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create an `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Returns `true` if this is a `NotFound` error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` if this is a `Conflict` error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns `true` if this is a client error (4xx equivalent).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Conflict(_) | Self::InvalidInput(_)
        )
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// Storage Facade
// =============================================================================

/// PostgreSQL storage backend for the CowTracker data model.
///
/// Holds a connection pool and hands out table-scoped storage types.
#[derive(Debug, Clone)]
pub struct CowtrackerStorage {
    pool: Arc<PgPool>,
}

impl CowtrackerStorage {
    /// Create new storage with an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create new storage by connecting to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        use sqlx_core::pool::PoolOptions;
        let pool = PoolOptions::<Postgres>::new().connect(database_url).await?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get a reference to the Arc-wrapped pool.
    #[must_use]
    pub fn pool_arc(&self) -> Arc<PgPool> {
        Arc::clone(&self.pool)
    }

    /// Farm storage operations.
    #[must_use]
    pub fn farms(&self) -> FarmStorage<'_> {
        FarmStorage::new(&self.pool)
    }

    /// User storage operations.
    #[must_use]
    pub fn users(&self) -> UserStorage<'_> {
        UserStorage::new(&self.pool)
    }

    /// Farm membership storage operations.
    #[must_use]
    pub fn memberships(&self) -> MembershipStorage<'_> {
        MembershipStorage::new(&self.pool)
    }

    /// Cattle storage operations.
    #[must_use]
    pub fn cattle(&self) -> CattleStorage<'_> {
        CattleStorage::new(&self.pool)
    }

    /// Veterinary record storage operations.
    #[must_use]
    pub fn vet_records(&self) -> VetRecordStorage<'_> {
        VetRecordStorage::new(&self.pool)
    }

    /// Medication storage operations.
    #[must_use]
    pub fn medications(&self) -> MedicationStorage<'_> {
        MedicationStorage::new(&self.pool)
    }

    /// Sale storage operations.
    #[must_use]
    pub fn sales(&self) -> SaleStorage<'_> {
        SaleStorage::new(&self.pool)
    }

    /// Premium tier storage operations.
    #[must_use]
    pub fn premium(&self) -> PremiumStorage<'_> {
        PremiumStorage::new(&self.pool)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_not_found() {
        let err = StorageError::not_found("Finca 42");
        assert!(err.is_not_found());
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "Not found: Finca 42");
    }

    #[test]
    fn storage_error_conflict() {
        let err = StorageError::conflict("La vinculación ya existe");
        assert!(err.is_conflict());
        assert!(err.is_client_error());
    }

    #[test]
    fn database_errors_are_not_client_errors() {
        let err = StorageError::from(sqlx_core::Error::PoolClosed);
        assert!(!err.is_client_error());
    }
}
