//! Storage ports. Handlers only ever talk to these traits; the SQLite and
//! hosted REST backends each implement all of them.

use std::sync::Arc;

use async_trait::async_trait;
use bansos_types::models::{AidApplication, Dispute, DisputeStatus, Stats, User};
use bansos_types::rules::ApplicationDecision;

use crate::StoreResult;
use crate::models::{NewApplication, NewDispute, NewResident, UserRecord};

/// Outcome of an admin decision on a dispute.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The dispute as stored after the decision.
    pub dispute: Dispute,
    /// Applications rejected by the cascade.
    pub cascaded: usize,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_admin_by_username(&self, username: &str) -> StoreResult<Option<UserRecord>>;

    async fn find_resident_by_nik(&self, nik: &str) -> StoreResult<Option<UserRecord>>;

    /// Any account holding `nik`, regardless of role.
    async fn find_by_nik(&self, nik: &str) -> StoreResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn create_resident(&self, new: &NewResident) -> StoreResult<i64>;

    /// Returns `true` if the admin account was created.
    async fn ensure_admin(&self, username: &str, nama: &str, password_hash: &str) -> StoreResult<bool>;

    async fn list_residents(&self) -> StoreResult<Vec<User>>;

    /// `false` if no resident has this id.
    async fn verify_resident(&self, id: i64) -> StoreResult<bool>;

    async fn delete_resident(&self, id: i64) -> StoreResult<bool>;

    async fn set_resident_password(&self, id: i64, password_hash: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn create_application(&self, new: &NewApplication) -> StoreResult<i64>;

    async fn list_applications_for_user(&self, user_id: i64) -> StoreResult<Vec<AidApplication>>;

    /// Every application, newest first, with owner name and NIK.
    async fn list_applications(&self) -> StoreResult<Vec<AidApplication>>;

    async fn set_application_status(&self, id: i64, decision: &ApplicationDecision) -> StoreResult<bool>;
}

#[async_trait]
pub trait DisputeRepository: Send + Sync {
    async fn create_dispute(&self, new: &NewDispute) -> StoreResult<i64>;

    async fn find_dispute(&self, id: i64) -> StoreResult<Option<Dispute>>;

    async fn list_disputes_by_filer(&self, user_id: i64) -> StoreResult<Vec<Dispute>>;

    async fn list_disputes(&self) -> StoreResult<Vec<Dispute>>;

    /// Set the dispute status and apply the cascade rule. `None` if the
    /// dispute does not exist.
    async fn resolve_dispute(&self, id: i64, decision: DisputeStatus) -> StoreResult<Option<Resolution>>;

    async fn delete_dispute(&self, id: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait StatsRepository: Send + Sync {
    async fn stats(&self) -> StoreResult<Stats>;
}

/// Every port a backend provides.
pub trait Backend: UserRepository + ApplicationRepository + DisputeRepository + StatsRepository {}

impl<T> Backend for T where T: UserRepository + ApplicationRepository + DisputeRepository + StatsRepository {}

/// The repositories handed to the HTTP layer.
#[derive(Clone)]
pub struct Store {
    pub users: Arc<dyn UserRepository>,
    pub applications: Arc<dyn ApplicationRepository>,
    pub disputes: Arc<dyn DisputeRepository>,
    pub stats: Arc<dyn StatsRepository>,
}

impl Store {
    pub fn new<B: Backend + 'static>(backend: B) -> Self {
        let backend = Arc::new(backend);
        Self {
            users: backend.clone(),
            applications: backend.clone(),
            disputes: backend.clone(),
            stats: backend,
        }
    }
}
