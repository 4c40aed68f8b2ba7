//! Audit logging
//!
//! Records every create, update and delete with before/after snapshots in an
//! append-only JSONL file. Entries carry the acting user and the budget they
//! belong to so a budget's activity feed can be read back.
//!
//! - `AuditEntry`: one operation on one entity.
//! - `AuditLogger`: appends entries and reads them back.
//! - `generate_diff`: summarizes field changes for update entries.

mod diff;
mod entry;
mod logger;

pub use diff::generate_diff;
pub use entry::{AuditEntry, EntityType, Operation};
pub use logger::AuditLogger;
