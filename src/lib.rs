//! riskwatch: an operational risk monitor for tenant work items.
//!
//! Watches each tenant's high-priority tasks for overdue risk, reassigns
//! items that blow through their grace period to a configured backup owner,
//! and raises deduplicated alerts with a full audit trail. Driven by a
//! debounced trigger loop in [`monitor`].

pub mod db;
pub mod error;
pub mod grace;
pub mod identity;
mod migrations;
pub mod monitor;
pub mod notify;
pub mod reassign;
pub mod types;
