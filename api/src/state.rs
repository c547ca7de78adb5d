use std::sync::Arc;

use assura_core::models::ModelRegistry;
use assura_core::recommendation::RecommendationEngine;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub registry: Arc<ModelRegistry>,
    pub engine: Arc<RecommendationEngine>,
}
