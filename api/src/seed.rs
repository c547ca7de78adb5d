use sqlx::PgPool;
use sqlx::types::Json;

use assura_core::models::ModelRegistry;

/// Register every loaded model in `model_info`. Existing rows are left as they are,
/// so history keeps pointing at the metrics a model had when it was first seen.
pub async fn register_models(pool: &PgPool, registry: &ModelRegistry) -> Result<u64, sqlx::Error> {
    let mut inserted = 0;
    for model in registry.iter() {
        let result = sqlx::query(
            r#"
            INSERT INTO model_info (name, metrics, columns)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(&model.name)
        .bind(Json(&model.benchmark))
        .bind(Json(&model.columns))
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!(model = %model.name, "registered model");
            inserted += result.rows_affected();
        }
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::routes::test_support::{db_pool_if_available, linear_model, unique_model_name};

    #[tokio::test]
    async fn registering_twice_inserts_once() {
        let Some(pool) = db_pool_if_available().await else {
            return;
        };

        let name = unique_model_name();
        let registry = ModelRegistry::from_models([linear_model(&name)]);

        let first = register_models(&pool, &registry)
            .await
            .expect("first registration should succeed");
        let second = register_models(&pool, &registry)
            .await
            .expect("second registration should succeed");
        assert_eq!(first, 1);
        assert_eq!(second, 0);

        let (count, metrics, columns): (i64, Json<serde_json::Value>, Json<Vec<String>>) =
            sqlx::query_as(
                "SELECT COUNT(*) OVER (), metrics, columns FROM model_info WHERE name = $1",
            )
            .bind(&name)
            .fetch_one(&pool)
            .await
            .expect("seeded row should exist");
        assert_eq!(count, 1);
        assert_eq!(metrics.0["MAE"], 4000.0);
        assert_eq!(columns.0.len(), 8);
        assert_eq!(columns.0[0], "age");
    }
}
