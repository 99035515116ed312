//! # Stored Records
//!
//! Typed views of the JSON documents kept in the remote content store.
//! Field names match the stored camelCase keys. Every record carries an
//! `extra` map so that fields written by other tools survive a
//! read-modify-write cycle through this crate unchanged.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::temporal::parse_instant;

// -- Plan tiers and roles -----------------------------------------------------

/// A user's subscription level.
///
/// Tiers outside the three known ones round-trip verbatim so that a plan
/// table edited by hand never makes the user registry undecodable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlanTier {
    #[default]
    Free,
    Pro,
    Vip,
    Other(String),
}

impl PlanTier {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Vip => "vip",
            Self::Other(s) => s,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, Self::Free)
    }

    /// The tier a payment plan label buys: anything mentioning "vip" is VIP,
    /// the rest is Pro.
    pub fn from_payment_label(label: &str) -> Self {
        if label.to_lowercase().contains("vip") {
            Self::Vip
        } else {
            Self::Pro
        }
    }
}

impl From<String> for PlanTier {
    fn from(s: String) -> Self {
        match s.as_str() {
            "free" => Self::Free,
            "pro" => Self::Pro,
            "vip" => Self::Vip,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for PlanTier {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<PlanTier> for String {
    fn from(tier: PlanTier) -> Self {
        match tier {
            PlanTier::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's administrative role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    #[default]
    User,
    Admin,
    Superadmin,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Superadmin => "superadmin",
            Self::Other(s) => s,
        }
    }

    /// Elevated roles bypass plan expiry and project quotas.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Self::Admin | Self::Superadmin)
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.as_str() {
            "user" => Self::User,
            "admin" => Self::Admin,
            "superadmin" => Self::Superadmin,
            _ => Self::Other(s),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- Users --------------------------------------------------------------------

/// An entry of `database/users.json`.
///
/// `Debug` redacts the password.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default)]
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub plan: PlanTier,
    #[serde(default)]
    pub role: Role,
    /// Stored verbatim; read through [`UserRecord::expiry`].
    #[serde(default)]
    pub expiry_date: Option<String>,
    /// Milliseconds since epoch of the last editor-trial reset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_last_reset: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_seconds_remaining: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserRecord {
    /// A freshly registered account: free tier, plain user, no expiry.
    pub fn new(
        id: i64,
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            email: email.into(),
            password: password.into(),
            plan: PlanTier::Free,
            role: Role::User,
            expiry_date: None,
            trial_last_reset: None,
            trial_seconds_remaining: None,
            extra: Map::new(),
        }
    }

    /// The parsed expiry instant, if one is set and readable.
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry_date.as_deref().and_then(parse_instant)
    }
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("plan", &self.plan)
            .field("role", &self.role)
            .field("expiry_date", &self.expiry_date)
            .field("trial_last_reset", &self.trial_last_reset)
            .field("trial_seconds_remaining", &self.trial_seconds_remaining)
            .finish()
    }
}

// -- Projects -----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Active,
    Archived,
}

/// An entry of `database/projects.json`. Identity is `(name, owner)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub status: ProjectStatus,
    pub created: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProjectRecord {
    pub fn new(name: impl Into<String>, owner: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            status: ProjectStatus::Active,
            created,
            extra: Map::new(),
        }
    }

    pub fn is(&self, name: &str, owner: &str) -> bool {
        self.name == name && self.owner == owner
    }
}

// -- Plans --------------------------------------------------------------------

/// Limits and pricing for one tier, as stored in `database/plans.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSpec {
    #[serde(default, deserialize_with = "number_or_text")]
    pub price: f64,
    /// Subscription length in days.
    #[serde(default = "default_duration", deserialize_with = "number_or_text")]
    pub duration: u32,
    /// Storage allowance in megabytes.
    #[serde(default, deserialize_with = "number_or_text")]
    pub storage: u64,
    /// `-1` means unlimited.
    #[serde(default = "default_max_projects", deserialize_with = "number_or_text")]
    pub max_projects: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Plan fields edited through the admin form are stored as strings such as
/// `"30"`; both forms decode to the same number.
fn number_or_text<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + DeserializeOwned,
    T::Err: fmt::Display,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => text.trim().parse().map_err(|e| {
            de::Error::custom(format!("expected a number, found {text:?}: {e}"))
        }),
        other => serde_json::from_value(other).map_err(de::Error::custom),
    }
}

fn default_duration() -> u32 {
    PlanTable::FALLBACK_DURATION_DAYS
}

fn default_max_projects() -> i64 {
    1
}

impl PlanSpec {
    pub fn new(price: f64, duration: u32, storage: u64, max_projects: i64) -> Self {
        Self {
            price,
            duration,
            storage,
            max_projects,
            extra: Map::new(),
        }
    }

    pub fn quota(&self) -> ProjectQuota {
        match self.max_projects {
            -1 => ProjectQuota::Unlimited,
            n => ProjectQuota::Limited(u32::try_from(n).unwrap_or(0)),
        }
    }
}

/// How many projects a tier may own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectQuota {
    Unlimited,
    Limited(u32),
}

impl ProjectQuota {
    /// Whether an owner who already has `owned` projects may create another.
    pub fn allows_another(&self, owned: usize) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Limited(max) => owned < *max as usize,
        }
    }
}

/// The tier → limits mapping of `database/plans.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanTable {
    plans: BTreeMap<String, PlanSpec>,
}

impl PlanTable {
    /// Duration used when an approved tier has no plan entry.
    pub const FALLBACK_DURATION_DAYS: u32 = 30;

    pub fn new(plans: BTreeMap<String, PlanSpec>) -> Self {
        Self { plans }
    }

    pub fn get(&self, tier: &PlanTier) -> Option<&PlanSpec> {
        self.plans.get(tier.as_str())
    }

    /// Limits for `tier`, falling back to the free tier's entry.
    pub fn limits_for(&self, tier: &PlanTier) -> Option<&PlanSpec> {
        self.get(tier).or_else(|| self.get(&PlanTier::Free))
    }

    /// Project quota for `tier`; a table without a usable entry allows one.
    pub fn quota_for(&self, tier: &PlanTier) -> ProjectQuota {
        self.limits_for(tier)
            .map(PlanSpec::quota)
            .unwrap_or(ProjectQuota::Limited(1))
    }

    /// Subscription length granted when `tier` is purchased.
    pub fn duration_days(&self, tier: &PlanTier) -> u32 {
        self.get(tier)
            .map(|p| p.duration)
            .filter(|d| *d > 0)
            .unwrap_or(Self::FALLBACK_DURATION_DAYS)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PlanSpec)> {
        self.plans.iter()
    }
}

impl Default for PlanTable {
    fn default() -> Self {
        let mut plans = BTreeMap::new();
        plans.insert("free".to_string(), PlanSpec::new(0.0, 365, 100, 1));
        plans.insert("pro".to_string(), PlanSpec::new(10.0, 30, 512, 10));
        plans.insert("vip".to_string(), PlanSpec::new(25.0, 30, 2048, -1));
        Self { plans }
    }
}

// -- Payments -----------------------------------------------------------------

/// A pending upgrade request in `database/payments.json`.
///
/// Amount and plan label are whatever the payer submitted; the panel never
/// interprets them beyond matching the plan label to a tier on approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub trx_id: String,
    #[serde(default)]
    pub amount: Value,
    #[serde(default)]
    pub plan: String,
    pub date: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PaymentRequest {
    pub fn requested_tier(&self) -> PlanTier {
        PlanTier::from_payment_label(&self.plan)
    }
}

/// A payment channel shown to payers, stored in `database/settings.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: i64,
    pub provider: String,
    pub number: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// -- Names --------------------------------------------------------------------

/// Validate a user-supplied name that becomes a single storage path segment.
pub fn validate_segment(kind: &'static str, value: &str) -> Result<(), CoreError> {
    let reject = |reason| {
        Err(CoreError::InvalidName {
            kind,
            value: value.to_string(),
            reason,
        })
    };
    if value.trim().is_empty() {
        return reject("must not be empty");
    }
    if value.contains('/') || value.contains('\\') {
        return reject("must not contain path separators");
    }
    if value == "." || value == ".." {
        return reject("must not be a relative path component");
    }
    if value.chars().any(char::is_control) {
        return reject("must not contain control characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_record_reads_stored_shape() {
        let user: UserRecord = serde_json::from_value(json!({
            "id": 1700000000000i64,
            "username": "alice",
            "email": "alice@example.com",
            "password": "pw",
            "plan": "pro",
            "role": "user",
            "expiryDate": "2025-01-01T00:00:00.000Z"
        }))
        .unwrap();
        assert_eq!(user.plan, PlanTier::Pro);
        assert_eq!(user.role, Role::User);
        assert!(user.expiry().is_some());
        assert!(user.trial_last_reset.is_none());
    }

    #[test]
    fn user_record_preserves_unknown_fields() {
        let raw = json!({
            "id": 1,
            "username": "bob",
            "email": "bob@example.com",
            "password": "pw",
            "plan": "free",
            "role": "user",
            "expiryDate": null,
            "avatar": "cat.png"
        });
        let user: UserRecord = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&user).unwrap(), raw);
    }

    #[test]
    fn unknown_tier_round_trips() {
        let tier: PlanTier = serde_json::from_value(json!("enterprise")).unwrap();
        assert_eq!(tier, PlanTier::Other("enterprise".into()));
        assert_eq!(serde_json::to_value(&tier).unwrap(), json!("enterprise"));
        assert!(!tier.is_free());
    }

    #[test]
    fn elevated_roles() {
        assert!(Role::Admin.is_elevated());
        assert!(Role::Superadmin.is_elevated());
        assert!(!Role::User.is_elevated());
        assert!(!Role::Other("moderator".into()).is_elevated());
    }

    #[test]
    fn debug_redacts_password() {
        let user = UserRecord::new(1, "carol", "c@example.com", "hunter2");
        let rendered = format!("{user:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn plan_table_falls_back_to_free_limits() {
        let table = PlanTable::default();
        assert_eq!(table.quota_for(&PlanTier::Free), ProjectQuota::Limited(1));
        assert_eq!(table.quota_for(&PlanTier::Pro), ProjectQuota::Limited(10));
        assert_eq!(table.quota_for(&PlanTier::Vip), ProjectQuota::Unlimited);
        assert_eq!(
            table.quota_for(&PlanTier::Other("gold".into())),
            ProjectQuota::Limited(1)
        );
    }

    #[test]
    fn plan_table_duration_defaults_to_thirty_days() {
        let table = PlanTable::new(BTreeMap::new());
        assert_eq!(table.duration_days(&PlanTier::Pro), 30);
        assert_eq!(PlanTable::default().duration_days(&PlanTier::Free), 365);
    }

    #[test]
    fn partial_plan_entries_decode() {
        let table: PlanTable = serde_json::from_value(json!({
            "free": { "max_projects": 1 },
            "pro": { "max_projects": 10 },
            "vip": { "max_projects": -1 }
        }))
        .unwrap();
        assert_eq!(table.quota_for(&PlanTier::Vip), ProjectQuota::Unlimited);
        assert_eq!(table.duration_days(&PlanTier::Pro), 30);
    }

    #[test]
    fn plan_fields_accept_numeric_text() {
        let table: PlanTable = serde_json::from_value(json!({
            "pro": { "price": "9.5", "duration": "45", "storage": " 512 ", "max_projects": "-1" },
            "vip": { "price": 20, "duration": 30, "storage": 2048, "max_projects": 3 }
        }))
        .unwrap();
        let pro = table.get(&PlanTier::Pro).unwrap();
        assert_eq!(pro.price, 9.5);
        assert_eq!(pro.duration, 45);
        assert_eq!(pro.storage, 512);
        assert_eq!(pro.quota(), ProjectQuota::Unlimited);
        assert_eq!(table.duration_days(&PlanTier::Vip), 30);
    }

    #[test]
    fn plan_fields_reject_non_numeric_text() {
        let err = serde_json::from_value::<PlanTable>(json!({
            "pro": { "duration": "monthly" }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("monthly"));
    }

    #[test]
    fn quota_allows_up_to_limit() {
        assert!(ProjectQuota::Limited(2).allows_another(1));
        assert!(!ProjectQuota::Limited(2).allows_another(2));
        assert!(ProjectQuota::Unlimited.allows_another(10_000));
        assert!(!PlanSpec::new(0.0, 30, 0, -5).quota().allows_another(0));
    }

    #[test]
    fn payment_label_maps_to_tier() {
        let mut req: PaymentRequest = serde_json::from_value(json!({
            "id": 7,
            "username": "dave",
            "method": "bkash",
            "number": "017",
            "trxId": "TX1",
            "amount": "25",
            "plan": "VIP Monthly",
            "date": "2025-02-01T00:00:00.000Z"
        }))
        .unwrap();
        assert_eq!(req.trx_id, "TX1");
        assert_eq!(req.requested_tier(), PlanTier::Vip);
        req.plan = "Pro".into();
        assert_eq!(req.requested_tier(), PlanTier::Pro);
    }

    #[test]
    fn segment_validation() {
        assert!(validate_segment("project name", "blog").is_ok());
        assert!(validate_segment("project name", "").is_err());
        assert!(validate_segment("project name", "..").is_err());
        assert!(validate_segment("file name", "a/b.html").is_err());
        assert!(validate_segment("file name", "a\\b.html").is_err());
    }
}
