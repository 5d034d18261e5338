//! Data structures shared by every stage of the pipeline.
//!
//! A [`job::StructureJob`] enters the orchestrator, the analyzer's XML output becomes a
//! [`report::InterfaceReport`], and metric derivation turns the report into one
//! [`metrics::StructureMetrics`] row.

pub mod job;
pub mod metrics;
pub mod report;
