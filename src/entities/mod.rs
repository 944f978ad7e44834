//! Database entities for the marketplace core.
//!
//! Parties and catalog scaffolding (companies, users, collections, samples)
//! plus the workflow entities: orders, negotiations, change log, production
//! tracking and revision requests.

pub mod change_log;
pub mod collection;
pub mod company;
pub mod negotiation;
pub mod order;
pub mod production_stage_update;
pub mod production_tracking;
pub mod revision_request;
pub mod revision_timeline;
pub mod sample;
pub mod user;
