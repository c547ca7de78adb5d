pub mod health;
pub mod history;
pub mod models;
pub mod plan;
pub mod plans;
pub mod predict;
