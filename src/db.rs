use anyhow::Context;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{Assessment, Module};
use crate::payload;
use crate::sync::SlipWriter;

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn fetch_modules(pool: &PgPool) -> anyhow::Result<Vec<Module>> {
    let rows = sqlx::query(
        "SELECT id, payload FROM result_slip.modules ORDER BY position, updated_at",
    )
    .fetch_all(pool)
    .await
    .context("failed to load modules")?;

    let mut modules = Vec::with_capacity(rows.len());
    for row in rows {
        let id: Uuid = row.get("id");
        let Json(payload): Json<Value> = row.get("payload");
        match payload::decode_module(payload) {
            Ok(mut module) => {
                module.id = id;
                modules.push(module);
            }
            Err(err) => eprintln!("Skipping module {id}: {err:#}"),
        }
    }

    Ok(modules)
}

pub async fn save_modules(pool: &PgPool, modules: &[Module]) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM result_slip.modules")
        .execute(&mut *tx)
        .await?;

    for (position, module) in modules.iter().enumerate() {
        let position = i32::try_from(position).context("too many modules to store")?;
        sqlx::query(
            r#"
            INSERT INTO result_slip.modules (id, position, payload, updated_at)
            VALUES ($1, $2, $3, NOW())
            "#,
        )
        .bind(module.id)
        .bind(position)
        .bind(Json(payload::encode_module(module)))
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to store module {}", module.display_name()))?;
    }

    tx.commit().await.context("failed to commit slip")?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let modules = sample_modules()?;
    save_modules(pool, &modules).await?;
    Ok(modules.len())
}

// Fixed ids keep seeding idempotent.
pub fn sample_modules() -> anyhow::Result<Vec<Module>> {
    let samples = vec![
        (
            Uuid::parse_str("6f1c2a9e-4b7d-4c1e-9a35-2d8e7f0b1c44")?,
            "Mathematics",
            Some(65.0),
            vec![("Midterm", 40.0, Some(72.0)), ("Final exam", 60.0, Some(68.0))],
        ),
        (
            Uuid::parse_str("b84d0f3a-91c2-4e6b-8f57-0a3c9d2e6b18")?,
            "Organic Chemistry",
            Some(80.0),
            vec![("Lab report", 30.0, Some(81.0)), ("Test 2", 20.0, Some(58.0))],
        ),
        (
            Uuid::parse_str("d41f6b20-3c8e-4a97-b5d1-7e2a0c9f4863")?,
            "Statistics",
            Some(85.0),
            vec![("Quiz 1", 25.0, Some(60.0)), ("Quiz 2", 25.0, Some(64.0))],
        ),
        (
            Uuid::parse_str("2e9a7c51-d6f0-4b83-a4c2-5f1e8b3d907a")?,
            "World History",
            None,
            vec![("Essay", 50.0, None)],
        ),
    ];

    Ok(samples
        .into_iter()
        .map(|(id, name, target, tests)| Module {
            id,
            name: name.to_string(),
            target,
            assessments: tests
                .into_iter()
                .map(|(name, weight, score)| Assessment {
                    name: name.to_string(),
                    weight: Some(weight),
                    score,
                })
                .collect(),
        })
        .collect())
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SlipWriter for PgStore {
    async fn write(&self, modules: Vec<Module>) -> anyhow::Result<()> {
        save_modules(&self.pool, &modules).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate;
    use crate::models::{AggregationPolicy, Status};

    #[test]
    fn sample_modules_have_stable_ids() {
        let first = sample_modules().unwrap();
        let second = sample_modules().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn sample_modules_cover_each_status() {
        let statuses: Vec<Status> = sample_modules()
            .unwrap()
            .iter()
            .map(|m| evaluate::evaluate_module(m, AggregationPolicy::Weighted).status)
            .collect();
        // 69.6 vs 65, 71.8 vs 80, 62.0 vs 85, no target
        assert_eq!(
            statuses,
            vec![
                Status::OnTrack,
                Status::Close,
                Status::ActionRequired,
                Status::NoTarget
            ]
        );
    }
}
