//! # pisabatch Core Library
//!
//! Bulk analysis of the interface between two chains across many candidate protein
//! structures, using CCP4 PISA as the external structural-interface analyzer.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer layout:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`InterfaceReport`, `StructureMetrics`),
//!   the PISA XML reader, CSV tables, metric derivation and the ranking mathematics.
//!
//! - **[`engine`]: The Execution Layer.** Resource estimation, the external analyzer seam,
//!   the concurrent batch orchestrator and the result aggregator.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures (analyze a corpus, rank a
//!   contacts table) that tie `engine` and `core` together and write the output tables.

pub mod core;
pub mod engine;
pub mod workflows;
