//! Integration tests for the link-code service.
//!
//! The datastore collaborators are mocked and the clock is manual, so every
//! scenario is deterministic: single-use redemption, role gating, lazy
//! expiry, farm scoping, reservation under concurrent redemption, and the
//! retry path when the membership link fails.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::sync::Notify;
use uuid::Uuid;

use cowtracker_core::{Clock, LinkRole};
use cowtracker_server::link_codes::{
    FarmLookup, LinkCodeError, LinkCodeService, LinkedUser, MembershipLink,
};
use cowtracker_storage::{MembershipRow, StorageError, StorageResult};

const WORKER_ROLE: i32 = 2;
const VET_ROLE: i32 = 3;

// =============================================================================
// Test doubles
// =============================================================================

struct ManualClock(Mutex<OffsetDateTime>);

impl ManualClock {
    fn starting_at(start: OffsetDateTime) -> Arc<Self> {
        Arc::new(Self(Mutex::new(start)))
    }

    fn advance(&self, delta: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> OffsetDateTime {
        *self.0.lock().unwrap()
    }
}

struct StaticFarms(Vec<i64>);

#[async_trait]
impl FarmLookup for StaticFarms {
    async fn farm_exists(&self, id_finca: i64) -> StorageResult<bool> {
        Ok(self.0.contains(&id_finca))
    }
}

#[derive(Default)]
struct MockMemberships {
    users: HashMap<Uuid, LinkedUser>,
    fail_link: AtomicBool,
    /// When set, `link` waits for a notification before completing, to model
    /// a slow datastore call.
    hold_link: Option<Arc<Notify>>,
    next_link_id: AtomicI64,
}

impl MockMemberships {
    fn with_user(mut self, auth_id: Uuid, id_usuario: i64, id_rol: i32) -> Self {
        self.users.insert(auth_id, LinkedUser { id_usuario, id_rol });
        self
    }
}

#[async_trait]
impl MembershipLink for MockMemberships {
    async fn find_user(&self, auth_id: Uuid) -> StorageResult<Option<LinkedUser>> {
        Ok(self.users.get(&auth_id).cloned())
    }

    async fn link(&self, id_usuario: i64, id_finca: i64) -> StorageResult<MembershipRow> {
        if let Some(ref gate) = self.hold_link {
            gate.notified().await;
        }
        if self.fail_link.load(Ordering::SeqCst) {
            return Err(StorageError::from(sqlx_core::Error::PoolClosed));
        }
        Ok(MembershipRow {
            id_usuario_finca: self.next_link_id.fetch_add(1, Ordering::SeqCst) + 1,
            id_usuario,
            id_finca,
        })
    }
}

fn worker_uuid() -> Uuid {
    Uuid::from_u128(1)
}

fn vet_uuid() -> Uuid {
    Uuid::from_u128(2)
}

fn service_with(
    farms: Vec<i64>,
    memberships: MockMemberships,
) -> (Arc<LinkCodeService>, Arc<ManualClock>) {
    let clock = ManualClock::starting_at(datetime!(2026-01-15 12:00:00 UTC));
    let service = Arc::new(LinkCodeService::new(
        Arc::new(StaticFarms(farms)),
        Arc::new(memberships),
        clock.clone(),
        Duration::from_secs(60 * 60),
    ));
    (service, clock)
}

fn default_memberships() -> MockMemberships {
    MockMemberships::default()
        .with_user(worker_uuid(), 10, WORKER_ROLE)
        .with_user(vet_uuid(), 11, VET_ROLE)
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn issued_codes_are_six_uppercase_alphanumeric_and_unique() {
    let (service, _clock) = service_with(vec![42], default_memberships());

    let mut seen = std::collections::HashSet::new();
    for _ in 0..50 {
        let issued = service.issue(42, LinkRole::Worker, None).await.unwrap();
        assert_eq!(issued.codigo.len(), 6);
        assert!(
            issued
                .codigo
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()),
            "unexpected characters in {}",
            issued.codigo
        );
        assert!(seen.insert(issued.codigo), "duplicate live code issued");
    }
    assert_eq!(service.len(), 50);
}

#[tokio::test]
async fn issue_rejects_unknown_farm() {
    let (service, _clock) = service_with(vec![42], default_memberships());

    let err = service.issue(99, LinkRole::Worker, None).await.unwrap_err();
    assert!(matches!(err, LinkCodeError::NotFound(_)), "got {err:?}");
}

#[tokio::test]
async fn issue_rejects_non_positive_duration() {
    let (service, _clock) = service_with(vec![42], default_memberships());

    let err = service
        .issue(42, LinkRole::Worker, Some(0))
        .await
        .unwrap_err();
    assert!(matches!(err, LinkCodeError::InvalidArgument(_)));

    let err = service
        .issue(42, LinkRole::Worker, Some(-5))
        .await
        .unwrap_err();
    assert!(matches!(err, LinkCodeError::InvalidArgument(_)));
}

#[tokio::test]
async fn redeem_succeeds_exactly_once() {
    let (service, _clock) = service_with(vec![42], default_memberships());

    let issued = service.issue(42, LinkRole::Worker, None).await.unwrap();

    let redemption = service.redeem(&issued.codigo, worker_uuid()).await.unwrap();
    assert_eq!(redemption.id_usuario, 10);
    assert_eq!(redemption.id_finca, 42);
    assert_eq!(redemption.tipo, LinkRole::Worker);
    assert_eq!(redemption.vinculacion.id_finca, 42);

    // Single-use: the second attempt sees no code.
    let err = service
        .redeem(&issued.codigo, worker_uuid())
        .await
        .unwrap_err();
    assert!(matches!(err, LinkCodeError::NotFound(_)));
}

#[tokio::test]
async fn role_mismatch_is_forbidden_and_leaves_code_active() {
    let (service, _clock) = service_with(vec![42], default_memberships());

    let issued = service
        .issue(42, LinkRole::Veterinarian, None)
        .await
        .unwrap();

    // A worker cannot redeem a veterinarian code.
    let err = service
        .redeem(&issued.codigo, worker_uuid())
        .await
        .unwrap_err();
    assert!(matches!(err, LinkCodeError::Forbidden(_)), "got {err:?}");

    // The code is still listed and still redeemable by the right role.
    let active = service.list_active(42);
    assert!(active.iter().any(|code| code.codigo == issued.codigo));

    service.redeem(&issued.codigo, vet_uuid()).await.unwrap();
}

#[tokio::test]
async fn expired_code_is_rejected_without_a_sweep() {
    let (service, clock) = service_with(vec![42], default_memberships());

    let issued = service
        .issue(42, LinkRole::Worker, Some(1))
        .await
        .unwrap();

    clock.advance(Duration::from_secs(2 * 60));

    // No sweep has run; the lazy check still rejects and removes the code.
    let err = service
        .redeem(&issued.codigo, worker_uuid())
        .await
        .unwrap_err();
    assert!(matches!(err, LinkCodeError::NotFound(_)));
    assert_eq!(service.len(), 0);
}

#[tokio::test]
async fn unknown_user_is_not_found_and_code_survives() {
    let (service, _clock) = service_with(vec![42], default_memberships());

    let issued = service.issue(42, LinkRole::Worker, None).await.unwrap();

    let err = service
        .redeem(&issued.codigo, Uuid::from_u128(999))
        .await
        .unwrap_err();
    assert!(matches!(err, LinkCodeError::NotFound(_)));

    // Still redeemable by a known user.
    service.redeem(&issued.codigo, worker_uuid()).await.unwrap();
}

#[tokio::test]
async fn list_active_scopes_by_farm_and_expiry() {
    let (service, clock) = service_with(vec![42, 43], default_memberships());

    let short = service.issue(42, LinkRole::Worker, Some(1)).await.unwrap();
    let long = service.issue(42, LinkRole::Veterinarian, None).await.unwrap();
    let other_farm = service.issue(43, LinkRole::Worker, None).await.unwrap();

    let active = service.list_active(42);
    assert_eq!(active.len(), 2);
    assert!(active.iter().all(|code| code.codigo != other_farm.codigo));

    clock.advance(Duration::from_secs(90));

    let active = service.list_active(42);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].codigo, long.codigo);
    assert_eq!(active[0].tipo, LinkRole::Veterinarian);
    assert!(active.iter().all(|code| code.codigo != short.codigo));
}

#[tokio::test]
async fn revoke_requires_matching_farm() {
    let (service, _clock) = service_with(vec![42, 43], default_memberships());

    let issued = service.issue(42, LinkRole::Worker, None).await.unwrap();

    assert!(!service.revoke(&issued.codigo, 43));
    assert_eq!(service.list_active(42).len(), 1);

    assert!(service.revoke(&issued.codigo, 42));
    assert!(service.list_active(42).is_empty());

    // Already gone
    assert!(!service.revoke(&issued.codigo, 42));
}

#[tokio::test]
async fn sweep_removes_expired_codes() {
    let (service, clock) = service_with(vec![42], default_memberships());

    service.issue(42, LinkRole::Worker, Some(1)).await.unwrap();
    service.issue(42, LinkRole::Worker, Some(120)).await.unwrap();
    assert_eq!(service.len(), 2);

    clock.advance(Duration::from_secs(5 * 60));
    service.sweep();

    assert_eq!(service.len(), 1);
}

#[tokio::test]
async fn failed_membership_link_keeps_code_redeemable() {
    let memberships = default_memberships();
    memberships.fail_link.store(true, Ordering::SeqCst);
    let fail_switch = Arc::new(memberships);

    let clock = ManualClock::starting_at(datetime!(2026-01-15 12:00:00 UTC));
    let service = Arc::new(LinkCodeService::new(
        Arc::new(StaticFarms(vec![42])),
        fail_switch.clone(),
        clock,
        Duration::from_secs(60 * 60),
    ));

    let issued = service.issue(42, LinkRole::Worker, None).await.unwrap();

    // The link step fails: the error propagates and the code survives.
    let err = service
        .redeem(&issued.codigo, worker_uuid())
        .await
        .unwrap_err();
    assert!(matches!(err, LinkCodeError::Storage(_)), "got {err:?}");
    assert_eq!(service.list_active(42).len(), 1);

    // Retry succeeds once the datastore recovers.
    fail_switch.fail_link.store(false, Ordering::SeqCst);
    service.redeem(&issued.codigo, worker_uuid()).await.unwrap();
    assert!(service.list_active(42).is_empty());
}

#[tokio::test]
async fn concurrent_redemption_loses_to_the_reservation() {
    let gate = Arc::new(Notify::new());
    let mut memberships = default_memberships();
    memberships.hold_link = Some(gate.clone());

    let clock = ManualClock::starting_at(datetime!(2026-01-15 12:00:00 UTC));
    let service = Arc::new(LinkCodeService::new(
        Arc::new(StaticFarms(vec![42])),
        Arc::new(memberships),
        clock,
        Duration::from_secs(60 * 60),
    ));

    let issued = service.issue(42, LinkRole::Worker, None).await.unwrap();
    let codigo = issued.codigo.clone();

    // First redemption reserves the code, then parks inside the link call.
    let first = tokio::spawn({
        let service = service.clone();
        let codigo = codigo.clone();
        async move { service.redeem(&codigo, worker_uuid()).await }
    });

    // Give the first task time to reach the gate.
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The second redemption must not observe the reserved code as live.
    let err = service.redeem(&codigo, worker_uuid()).await.unwrap_err();
    assert!(matches!(err, LinkCodeError::NotFound(_)), "got {err:?}");

    // Release the first redemption; it wins.
    gate.notify_one();
    let redemption = first.await.unwrap().unwrap();
    assert_eq!(redemption.id_usuario, 10);

    // The code is gone for everyone afterwards.
    let err = service.redeem(&codigo, worker_uuid()).await.unwrap_err();
    assert!(matches!(err, LinkCodeError::NotFound(_)));
}

#[tokio::test]
async fn restart_invalidates_codes_by_construction() {
    // A fresh service instance holds no codes: process restart discards all
    // outstanding invitations.
    let (service, _clock) = service_with(vec![42], default_memberships());
    service.issue(42, LinkRole::Worker, None).await.unwrap();

    let (fresh, _clock) = service_with(vec![42], default_memberships());
    assert!(fresh.is_empty());
}
