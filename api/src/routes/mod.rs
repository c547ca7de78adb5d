pub mod health;
pub mod models;
pub mod plans;
pub mod predictions;
