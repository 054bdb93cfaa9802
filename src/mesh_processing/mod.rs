pub mod analysis;
pub mod consolidate;

pub use analysis::{analyze_model, MeshStats};
pub use consolidate::{consolidate, ConsolidateOptions, ConsolidateReport};
