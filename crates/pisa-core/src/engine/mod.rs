//! # Engine Module
//!
//! Runs batches of structure analyses against the external PISA analyzer and collects the
//! per-structure outcomes.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Immutable batch parameters built with a checked builder
//! - **Resources** ([`resources`]) - Host inspection, disk throughput probe and worker sizing
//! - **Analyzer** ([`analyzer`]) - The analyzer seam and its subprocess-backed implementation
//! - **Orchestration** ([`orchestrator`]) - Bounded parallel execution with per-job failure isolation
//! - **Aggregation** ([`aggregate`]) - Keyed metric tables and metadata joins
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress reporting
//! - **Error Handling** ([`error`]) - Engine-level error types

pub mod aggregate;
pub mod analyzer;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod resources;
