//! Hosted Postgres backend reached through its PostgREST interface
//! (`{SUPABASE_URL}/rest/v1`), authenticated with the service-role key.
//!
//! PostgREST offers no transaction spanning two tables, so a dispute decision
//! is written first and its cascade second. A failed cascade is logged and
//! swallowed; the decision itself still succeeds.

use async_trait::async_trait;
use bansos_types::models::{
    AidApplication, ApplicationStatus, Dispute, DisputeKind, DisputeStatus, NAMED_PROGRAMMES, Role,
    Stats, User,
};
use bansos_types::rules::{self, ApplicationDecision, Cascade, CASCADE_SCOPE};
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Response, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{error, info, warn};

use crate::models::{
    ApplicationRow, DisputeRow, NewApplication, NewDispute, NewResident, UserRecord, UserRow,
};
use crate::repository::{
    ApplicationRepository, DisputeRepository, Resolution, StatsRepository, UserRepository,
};
use crate::{StoreError, StoreResult};

const APPLICATION_EMBED: &str = "*,owner:users!user_id(nama,nik)";
const DISPUTE_EMBED: &str =
    "*,pelapor:users!pelapor_user_id(nama,nik),target:users!target_user_id(nama,nik)";

type Filter = (&'static str, String);

#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    service_key: String,
}

#[derive(Debug, Deserialize)]
struct Person {
    nama: Option<String>,
    nik: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddedApplication {
    #[serde(flatten)]
    row: ApplicationRow,
    owner: Option<Person>,
}

impl EmbeddedApplication {
    fn into_application(self) -> StoreResult<AidApplication> {
        let mut row = self.row;
        if let Some(owner) = self.owner {
            row.nama = owner.nama;
            row.nik = owner.nik;
        }
        row.into_application()
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddedDispute {
    #[serde(flatten)]
    row: DisputeRow,
    pelapor: Option<Person>,
    target: Option<Person>,
}

impl EmbeddedDispute {
    fn into_dispute(self) -> StoreResult<Dispute> {
        let mut row = self.row;
        if let Some(p) = self.pelapor {
            row.pelapor_nama = p.nama;
            row.pelapor_nik = p.nik;
        }
        if let Some(t) = self.target {
            row.target_nama = t.nama;
            row.target_nik = t.nik;
        }
        row.into_dispute()
    }
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: i64,
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

fn in_list<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = values.into_iter().map(|v| v.as_ref().to_string()).collect::<Vec<_>>().join(",");
    format!("in.({})", joined)
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

impl RestStore {
    pub fn new(client: Client, supabase_url: &str, service_key: &str) -> Self {
        Self {
            client,
            base_url: format!("{}/rest/v1", supabase_url.trim_end_matches('/')),
            service_key: service_key.to_string(),
        }
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.base_url, table))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn check(response: Response) -> StoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Remote { status: status.as_u16(), body })
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        columns: &str,
        filters: &[Filter],
        order: Option<&str>,
    ) -> StoreResult<Vec<T>> {
        let mut req = self
            .request(Method::GET, table)
            .query(&[("select", columns)])
            .query(filters);
        if let Some(order) = order {
            req = req.query(&[("order", order)]);
        }
        let response = Self::check(req.send().await?).await?;
        Ok(response.json().await?)
    }

    /// Write rows and return them as stored.
    async fn write<T: DeserializeOwned>(
        &self,
        method: Method,
        table: &str,
        filters: &[Filter],
        body: &serde_json::Value,
    ) -> StoreResult<Vec<T>> {
        let req = self
            .request(method, table)
            .query(filters)
            .header("Prefer", "return=representation")
            .json(body);
        let response = Self::check(req.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> StoreResult<usize> {
        let req = self
            .request(Method::DELETE, table)
            .query(filters)
            .header("Prefer", "return=representation");
        let response = Self::check(req.send().await?).await?;
        let rows: Vec<IdRow> = response.json().await?;
        Ok(rows.len())
    }

    /// Exact row count from the `Content-Range` header ("0-24/318", "*/0").
    async fn count(&self, table: &str, filters: &[Filter]) -> StoreResult<u64> {
        let req = self
            .request(Method::HEAD, table)
            .query(&[("select", "id")])
            .query(filters)
            .header("Prefer", "count=exact");
        let response = Self::check(req.send().await?).await?;
        let range = response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        parse_content_range_total(range)
            .ok_or_else(|| StoreError::Corrupt(format!("bad Content-Range '{}'", range)))
    }

    async fn one_user(&self, filters: &[Filter]) -> StoreResult<Option<UserRecord>> {
        let rows: Vec<UserRow> = self.select("users", "*", filters, None).await?;
        rows.into_iter().next().map(UserRow::into_record).transpose()
    }

    async fn apply_cascade(&self, cascade: &Cascade) -> StoreResult<usize> {
        let rows: Vec<IdRow> = self
            .write(
                Method::PATCH,
                "bantuan_sosial",
                &[
                    ("user_id", eq(cascade.user_id)),
                    ("status", in_list(CASCADE_SCOPE.iter().map(|s| s.as_str()))),
                ],
                &json!({
                    "status": ApplicationStatus::Rejected.as_str(),
                    "rejection_reason": cascade.reason,
                    "updated_at": now(),
                }),
            )
            .await?;
        Ok(rows.len())
    }
}

pub(crate) fn parse_content_range_total(range: &str) -> Option<u64> {
    range.rsplit_once('/').and_then(|(_, total)| total.trim().parse().ok())
}

#[async_trait]
impl UserRepository for RestStore {
    async fn find_admin_by_username(&self, username: &str) -> StoreResult<Option<UserRecord>> {
        self.one_user(&[("username", eq(username)), ("role", eq(Role::Admin.as_str()))]).await
    }

    async fn find_resident_by_nik(&self, nik: &str) -> StoreResult<Option<UserRecord>> {
        self.one_user(&[("nik", eq(nik)), ("role", eq(Role::Warga.as_str()))]).await
    }

    async fn find_by_nik(&self, nik: &str) -> StoreResult<Option<User>> {
        Ok(self.one_user(&[("nik", eq(nik))]).await?.map(|r| r.user))
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.one_user(&[("email", eq(email))]).await?.map(|r| r.user))
    }

    async fn create_resident(&self, new: &NewResident) -> StoreResult<i64> {
        let mut body = serde_json::to_value(new).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        body["role"] = json!(Role::Warga.as_str());
        body["verified"] = json!(false);

        let rows: Vec<IdRow> = match self.write(Method::POST, "users", &[], &body).await {
            // unique_violation
            Err(StoreError::Remote { status: 409, body }) => {
                return Err(StoreError::Duplicate(if body.contains("email") { "email" } else { "nik" }));
            }
            other => other?,
        };
        rows.first()
            .map(|r| r.id)
            .ok_or_else(|| StoreError::Corrupt("insert into users returned no row".into()))
    }

    async fn ensure_admin(&self, username: &str, nama: &str, password_hash: &str) -> StoreResult<bool> {
        if self.find_admin_by_username(username).await?.is_some() {
            return Ok(false);
        }
        let body = json!({
            "username": username,
            "nama": nama,
            "password": password_hash,
            "role": Role::Admin.as_str(),
            "verified": true,
        });
        let _: Vec<IdRow> = self.write(Method::POST, "users", &[], &body).await?;
        Ok(true)
    }

    async fn list_residents(&self) -> StoreResult<Vec<User>> {
        let rows: Vec<UserRow> = self
            .select("users", "*", &[("role", eq(Role::Warga.as_str()))], Some("created_at.desc,id.desc"))
            .await?;
        rows.into_iter().map(UserRow::into_user).collect()
    }

    async fn verify_resident(&self, id: i64) -> StoreResult<bool> {
        let rows: Vec<IdRow> = self
            .write(
                Method::PATCH,
                "users",
                &[("id", eq(id)), ("role", eq(Role::Warga.as_str()))],
                &json!({ "verified": true, "verified_at": now() }),
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn delete_resident(&self, id: i64) -> StoreResult<bool> {
        let deleted = self
            .delete("users", &[("id", eq(id)), ("role", eq(Role::Warga.as_str()))])
            .await?;
        Ok(deleted > 0)
    }

    async fn set_resident_password(&self, id: i64, password_hash: &str) -> StoreResult<bool> {
        let rows: Vec<IdRow> = self
            .write(
                Method::PATCH,
                "users",
                &[("id", eq(id)), ("role", eq(Role::Warga.as_str()))],
                &json!({ "password": password_hash }),
            )
            .await?;
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl ApplicationRepository for RestStore {
    async fn create_application(&self, new: &NewApplication) -> StoreResult<i64> {
        let body = serde_json::to_value(new).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let rows: Vec<IdRow> = self.write(Method::POST, "bantuan_sosial", &[], &body).await?;
        rows.first()
            .map(|r| r.id)
            .ok_or_else(|| StoreError::Corrupt("insert into bantuan_sosial returned no row".into()))
    }

    async fn list_applications_for_user(&self, user_id: i64) -> StoreResult<Vec<AidApplication>> {
        let rows: Vec<EmbeddedApplication> = self
            .select(
                "bantuan_sosial",
                APPLICATION_EMBED,
                &[("user_id", eq(user_id))],
                Some("created_at.desc,id.desc"),
            )
            .await?;
        rows.into_iter().map(EmbeddedApplication::into_application).collect()
    }

    async fn list_applications(&self) -> StoreResult<Vec<AidApplication>> {
        let rows: Vec<EmbeddedApplication> = self
            .select("bantuan_sosial", APPLICATION_EMBED, &[], Some("created_at.desc,id.desc"))
            .await?;
        rows.into_iter().map(EmbeddedApplication::into_application).collect()
    }

    async fn set_application_status(&self, id: i64, decision: &ApplicationDecision) -> StoreResult<bool> {
        let rows: Vec<IdRow> = self
            .write(
                Method::PATCH,
                "bantuan_sosial",
                &[("id", eq(id))],
                &json!({
                    "status": decision.status.as_str(),
                    "rejection_reason": decision.reason,
                    "updated_at": now(),
                }),
            )
            .await?;
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl DisputeRepository for RestStore {
    async fn create_dispute(&self, new: &NewDispute) -> StoreResult<i64> {
        let body = serde_json::to_value(new).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let rows: Vec<IdRow> = self.write(Method::POST, "sanggahan", &[], &body).await?;
        rows.first()
            .map(|r| r.id)
            .ok_or_else(|| StoreError::Corrupt("insert into sanggahan returned no row".into()))
    }

    async fn find_dispute(&self, id: i64) -> StoreResult<Option<Dispute>> {
        let rows: Vec<EmbeddedDispute> =
            self.select("sanggahan", DISPUTE_EMBED, &[("id", eq(id))], None).await?;
        rows.into_iter().next().map(EmbeddedDispute::into_dispute).transpose()
    }

    async fn list_disputes_by_filer(&self, user_id: i64) -> StoreResult<Vec<Dispute>> {
        let rows: Vec<EmbeddedDispute> = self
            .select(
                "sanggahan",
                DISPUTE_EMBED,
                &[("pelapor_user_id", eq(user_id))],
                Some("created_at.desc,id.desc"),
            )
            .await?;
        rows.into_iter().map(EmbeddedDispute::into_dispute).collect()
    }

    async fn list_disputes(&self) -> StoreResult<Vec<Dispute>> {
        let rows: Vec<EmbeddedDispute> = self
            .select("sanggahan", DISPUTE_EMBED, &[], Some("created_at.desc,id.desc"))
            .await?;
        rows.into_iter().map(EmbeddedDispute::into_dispute).collect()
    }

    async fn resolve_dispute(&self, id: i64, decision: DisputeStatus) -> StoreResult<Option<Resolution>> {
        let Some(mut dispute) = self.find_dispute(id).await? else {
            return Ok(None);
        };
        let cascade = rules::cascade_for(&dispute, decision)?;

        let updated_at = Utc::now();
        let rows: Vec<IdRow> = self
            .write(
                Method::PATCH,
                "sanggahan",
                &[("id", eq(id))],
                &json!({ "status": decision.as_str(), "updated_at": updated_at.to_rfc3339() }),
            )
            .await?;
        if rows.is_empty() {
            // Deleted between the read and the write.
            return Ok(None);
        }
        dispute.status = decision;
        dispute.updated_at = updated_at;

        let cascaded = match cascade {
            Some(cascade) => match self.apply_cascade(&cascade).await {
                Ok(n) => n,
                Err(e) => {
                    error!(
                        "Sanggahan {} accepted but rejecting bantuan of user {} failed: {}",
                        id, cascade.user_id, e
                    );
                    0
                }
            },
            None => 0,
        };

        info!("Sanggahan {} set to {} ({} bantuan rejected)", id, decision, cascaded);
        Ok(Some(Resolution { dispute, cascaded }))
    }

    async fn delete_dispute(&self, id: i64) -> StoreResult<bool> {
        Ok(self.delete("sanggahan", &[("id", eq(id))]).await? > 0)
    }
}

#[async_trait]
impl StatsRepository for RestStore {
    /// One count per counter; a failing count is logged and reported as 0 so
    /// the dashboard still renders.
    async fn stats(&self) -> StoreResult<Stats> {
        let warga = eq(Role::Warga.as_str());
        let counted = |label: &'static str, result: StoreResult<u64>| match result {
            Ok(n) => n,
            Err(e) => {
                warn!("Stats count '{}' failed: {}", label, e);
                0
            }
        };

        let total_users = counted("totalUsers", self.count("users", &[("role", warga.clone())]).await);
        let verified_users = counted(
            "verifiedUsers",
            self.count("users", &[("role", warga), ("verified", eq(true))]).await,
        );

        let by_status = |status: ApplicationStatus| [("status", eq(status.as_str()))];
        let by_kind = |kind: DisputeKind| [("tipe", eq(kind.as_str()))];

        Ok(Stats {
            total_users,
            verified_users,
            pending_users: total_users.saturating_sub(verified_users),
            total_bantuan: counted("totalBantuan", self.count("bantuan_sosial", &[]).await),
            pkh: counted(
                "pkh",
                self.count("bantuan_sosial", &[("jenis_bantuan", eq(NAMED_PROGRAMMES[0]))]).await,
            ),
            bnpt: counted(
                "bnpt",
                self.count("bantuan_sosial", &[("jenis_bantuan", eq(NAMED_PROGRAMMES[1]))]).await,
            ),
            non_bansos: counted(
                "nonBansos",
                self.count(
                    "bantuan_sosial",
                    &[("jenis_bantuan", format!("not.{}", in_list(NAMED_PROGRAMMES)))],
                )
                .await,
            ),
            approved_bantuan: counted(
                "approvedBantuan",
                self.count("bantuan_sosial", &by_status(ApplicationStatus::Approved)).await,
            ),
            rejected_bantuan: counted(
                "rejectedBantuan",
                self.count("bantuan_sosial", &by_status(ApplicationStatus::Rejected)).await,
            ),
            pending_bantuan: counted(
                "pendingBantuan",
                self.count("bantuan_sosial", &by_status(ApplicationStatus::Pending)).await,
            ),
            total_sanggahan: counted("totalSanggahan", self.count("sanggahan", &[]).await),
            sanggahan_diri_sendiri: counted(
                "sanggahanDiriSendiri",
                self.count("sanggahan", &by_kind(DisputeKind::DiriSendiri)).await,
            ),
            sanggahan_warga_lain: counted(
                "sanggahanWargaLain",
                self.count("sanggahan", &by_kind(DisputeKind::WargaLain)).await,
            ),
        })
    }
}
