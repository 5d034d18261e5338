pub mod analyze;
pub mod estimate;
pub mod merge;
pub mod preflight;
pub mod rank;
