//! Workflow engines over the shared relational store.
//!
//! Each service is a stateless request/response transformer: it validates
//! permission and state-machine legality, applies the new state plus its
//! audit entry inside one transaction, and emits fire-and-forget
//! notifications that can never fail the primary transition.

pub mod negotiations;
pub mod orders;
pub mod production;
pub mod revisions;
