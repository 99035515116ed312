//! # sitehost-core: Domain Types for the SiteHost Control Panel
//!
//! This crate holds everything in the control panel that can be reasoned
//! about without I/O:
//!
//! - **Records** ([`records`]): the JSON documents persisted in the remote
//!   content store (users, projects, plans, payments, payment methods).
//! - **Plan lifecycle** ([`plan`]): the `free ⇄ {pro, vip}` state machine and
//!   the lazy, access-triggered expiry sweep.
//! - **Editor trial clock** ([`trial`]): the daily allowance for free users.
//! - **Watermark policy** ([`watermark`]): idempotent insertion and removal of
//!   the hosted-by marker in project entry files.
//! - **Time** ([`temporal`]): an injectable [`Clock`] so that expiry and cache
//!   freshness can be tested without wall-clock sleeps.
//!
//! Storage, caching and the remote API live in `sitehost-content-client` and
//! `sitehost-store`; this crate never touches the network.

pub mod error;
pub mod plan;
pub mod records;
pub mod temporal;
pub mod trial;
pub mod watermark;

pub use error::CoreError;
pub use plan::sweep_expiry;
pub use records::{
    PaymentMethod, PaymentRequest, PlanSpec, PlanTable, PlanTier, ProjectQuota, ProjectRecord,
    ProjectStatus, Role, UserRecord,
};
pub use temporal::{Clock, ManualClock, SystemClock};
pub use watermark::WatermarkPolicy;
