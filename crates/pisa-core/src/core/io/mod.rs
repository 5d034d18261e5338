//! Readers and writers for the file formats the pipeline consumes and produces.
//!
//! - [`report`] parses the PISA `interfaces` XML report.
//! - [`tables`] reads and writes the contacts, ranking, failure and metadata CSV tables.
//! - [`settings`] handles the flat `key: value` resource settings file.

pub mod report;
pub mod settings;
pub mod tables;
