//! Calouro tracker: the data side of a república's incoming-student
//! dashboard.
//!
//! Approval rosters for the house's city are joined with what the house has
//! recorded about each calouro (favorite, workflow status), narrowed by the
//! user's filters, paged, exported, and summarized. Favorite and status
//! changes apply optimistically and roll back if the backend rejects them.

pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod filter;
pub mod fixtures;
pub mod key;
pub mod metadata;
pub mod models;
pub mod mutation;
pub mod options;
pub mod pagination;
pub mod report;
pub mod saved;
pub mod view;
