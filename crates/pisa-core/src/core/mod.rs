//! # Core Module
//!
//! Stateless building blocks of the interface-analysis pipeline.
//!
//! - **Data Model** ([`models`]) - Parsed interface reports, structure jobs and metric rows
//! - **File I/O** ([`io`]) - PISA XML reports, contacts/ranking CSV tables, resource settings
//! - **Metric Derivation** ([`metrics`]) - Buried-area score, bond counts, energetics, composition
//! - **Ranking** ([`ranking`]) - Normalization and weighted composite scoring across a corpus

pub mod io;
pub mod metrics;
pub mod models;
pub mod ranking;
