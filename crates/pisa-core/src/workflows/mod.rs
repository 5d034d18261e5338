//! # Workflows Module
//!
//! End-to-end entry points tying the [`engine`](crate::engine) and [`core`](crate::core)
//! layers together.
//!
//! - **Analysis** ([`analyze`]) - Discover structures, run the batch and write the contacts
//!   and failure tables.
//! - **Ranking** ([`rank`]) - Read a contacts table and write the full and overlap-free
//!   rankings.
//! - **Merge** ([`merge`]) - Join a contacts table with per-design sequence metadata.

pub mod analyze;
pub mod merge;
pub mod rank;
