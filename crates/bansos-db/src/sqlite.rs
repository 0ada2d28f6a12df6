use std::sync::Arc;

use async_trait::async_trait;
use bansos_types::models::{AidApplication, Dispute, DisputeStatus, Role, Stats, User};
use bansos_types::rules::ApplicationDecision;

use crate::models::{NewApplication, NewDispute, NewResident, UserRecord};
use crate::repository::{
    ApplicationRepository, DisputeRepository, Resolution, StatsRepository, UserRepository,
};
use crate::{Database, StoreResult};

/// Repository backend over the embedded SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Run blocking DB work off the async runtime.
    async fn blocking<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }
}

#[async_trait]
impl UserRepository for SqliteStore {
    async fn find_admin_by_username(&self, username: &str) -> StoreResult<Option<UserRecord>> {
        let username = username.to_string();
        self.blocking(move |db| db.get_user_by_username(&username, Role::Admin)).await
    }

    async fn find_resident_by_nik(&self, nik: &str) -> StoreResult<Option<UserRecord>> {
        let nik = nik.to_string();
        self.blocking(move |db| db.get_user_by_nik(&nik, Some(Role::Warga))).await
    }

    async fn find_by_nik(&self, nik: &str) -> StoreResult<Option<User>> {
        let nik = nik.to_string();
        self.blocking(move |db| Ok(db.get_user_by_nik(&nik, None)?.map(|r| r.user))).await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.to_string();
        self.blocking(move |db| Ok(db.get_user_by_email(&email)?.map(|r| r.user))).await
    }

    async fn create_resident(&self, new: &NewResident) -> StoreResult<i64> {
        let new = new.clone();
        self.blocking(move |db| db.create_resident(&new)).await
    }

    async fn ensure_admin(&self, username: &str, nama: &str, password_hash: &str) -> StoreResult<bool> {
        let (username, nama, hash) = (username.to_string(), nama.to_string(), password_hash.to_string());
        self.blocking(move |db| db.create_admin_if_missing(&username, &nama, &hash)).await
    }

    async fn list_residents(&self) -> StoreResult<Vec<User>> {
        self.blocking(|db| db.list_residents()).await
    }

    async fn verify_resident(&self, id: i64) -> StoreResult<bool> {
        self.blocking(move |db| db.verify_resident(id)).await
    }

    async fn delete_resident(&self, id: i64) -> StoreResult<bool> {
        self.blocking(move |db| db.delete_resident(id)).await
    }

    async fn set_resident_password(&self, id: i64, password_hash: &str) -> StoreResult<bool> {
        let hash = password_hash.to_string();
        self.blocking(move |db| db.set_resident_password(id, &hash)).await
    }
}

#[async_trait]
impl ApplicationRepository for SqliteStore {
    async fn create_application(&self, new: &NewApplication) -> StoreResult<i64> {
        let new = new.clone();
        self.blocking(move |db| db.insert_application(&new)).await
    }

    async fn list_applications_for_user(&self, user_id: i64) -> StoreResult<Vec<AidApplication>> {
        self.blocking(move |db| db.list_applications_for_user(user_id)).await
    }

    async fn list_applications(&self) -> StoreResult<Vec<AidApplication>> {
        self.blocking(|db| db.list_applications()).await
    }

    async fn set_application_status(&self, id: i64, decision: &ApplicationDecision) -> StoreResult<bool> {
        let decision = decision.clone();
        self.blocking(move |db| db.set_application_status(id, &decision)).await
    }
}

#[async_trait]
impl DisputeRepository for SqliteStore {
    async fn create_dispute(&self, new: &NewDispute) -> StoreResult<i64> {
        let new = new.clone();
        self.blocking(move |db| db.insert_dispute(&new)).await
    }

    async fn find_dispute(&self, id: i64) -> StoreResult<Option<Dispute>> {
        self.blocking(move |db| db.get_dispute(id)).await
    }

    async fn list_disputes_by_filer(&self, user_id: i64) -> StoreResult<Vec<Dispute>> {
        self.blocking(move |db| db.list_disputes_by_filer(user_id)).await
    }

    async fn list_disputes(&self) -> StoreResult<Vec<Dispute>> {
        self.blocking(|db| db.list_disputes()).await
    }

    async fn resolve_dispute(&self, id: i64, decision: DisputeStatus) -> StoreResult<Option<Resolution>> {
        self.blocking(move |db| db.resolve_dispute(id, decision)).await
    }

    async fn delete_dispute(&self, id: i64) -> StoreResult<bool> {
        self.blocking(move |db| db.delete_dispute(id)).await
    }
}

#[async_trait]
impl StatsRepository for SqliteStore {
    async fn stats(&self) -> StoreResult<Stats> {
        self.blocking(|db| db.stats()).await
    }
}
