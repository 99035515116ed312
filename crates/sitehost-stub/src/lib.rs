//! # sitehost-stub
//!
//! An HTTP server that speaks the subset of the GitHub contents API used by
//! `sitehost-content-client`, backed by a [`MemoryContentApi`]. Point
//! `CONTENT_API_URL` at it to run the control panel without a real storage
//! repository.
//!
//! Any `{owner}/{repo}` pair is accepted and they all share one store. Data
//! lives in memory and is lost on restart.
//!
//! [`MemoryContentApi`]: sitehost_content_client::MemoryContentApi

pub mod routes;

pub use routes::router;
