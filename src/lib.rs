//! Visit analytics for a single-page marketing site.
//!
//! A browser-side [`tracker::recorder::Recorder`] turns view changes and
//! clicks into [`event::VisitEvent`]s appended to a shared
//! [`storage::visit_log::VisitLog`]; [`query::aggregate`] computes the
//! dashboard numbers over that log. [`server`] exposes both over HTTP.

pub mod api;
pub mod config;
pub mod event;
pub mod ingest;
pub mod query;
pub mod server;
pub mod storage;
pub mod tracker;
