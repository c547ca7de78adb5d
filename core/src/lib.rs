pub mod attribution;
pub mod error;
pub mod models;
pub mod plan;
pub mod predictions;
pub mod profile;
pub mod recommendation;
pub mod thresholds;
