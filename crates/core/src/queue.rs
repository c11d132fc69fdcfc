//! Pending-queue ranking.
//!
//! Eligibility (pending, unassigned, every dependency merged) is a predicate
//! the repository evaluates in SQL; only the ordering is shared here so the
//! claim and preview queries cannot drift apart.

/// `ORDER BY` clause used by the claim and preview queries: higher priority
/// first, then oldest, then lowest id.
pub const QUEUE_ORDER_SQL: &str = "priority DESC, created_at ASC, id ASC";
