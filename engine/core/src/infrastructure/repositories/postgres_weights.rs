// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::repository::{RepositoryError, WeightStore};
use crate::domain::weights::{SegmentType, WeightVector};

/// Reads learned weights from the `segment_weights` table.
pub struct PostgresWeightStore {
    pool: PgPool,
}

impl PostgresWeightStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace a segment's weights (used by the weight learner and
    /// by `bellwether db seed-weights`).
    pub async fn upsert(&self, weights: &WeightVector) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO segment_weights
                (segment_key, segment_type, sss_weight, ars_weight, evs_weight, trs_weight, sample_size, is_validated, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            ON CONFLICT (segment_key) DO UPDATE SET
                segment_type = EXCLUDED.segment_type,
                sss_weight = EXCLUDED.sss_weight,
                ars_weight = EXCLUDED.ars_weight,
                evs_weight = EXCLUDED.evs_weight,
                trs_weight = EXCLUDED.trs_weight,
                sample_size = EXCLUDED.sample_size,
                is_validated = EXCLUDED.is_validated,
                updated_at = NOW()
            "#,
        )
        .bind(&weights.segment_key)
        .bind(weights.segment_type.as_str())
        .bind(weights.sss_weight)
        .bind(weights.ars_weight)
        .bind(weights.evs_weight)
        .bind(weights.trs_weight)
        .bind(i64::try_from(weights.sample_size).unwrap_or(i64::MAX))
        .bind(weights.is_validated)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to upsert segment weights: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl WeightStore for PostgresWeightStore {
    async fn find_by_segment_key(&self, key: &str) -> Result<Option<WeightVector>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT segment_key, segment_type, sss_weight, ars_weight, evs_weight, trs_weight,
                   sample_size, is_validated
            FROM segment_weights
            WHERE segment_key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let segment_type: String = row.try_get("segment_type")?;
        let segment_type = segment_type
            .parse::<SegmentType>()
            .map_err(RepositoryError::Serialization)?;
        let sample_size: i64 = row.try_get("sample_size")?;

        Ok(Some(WeightVector {
            sss_weight: row.try_get("sss_weight")?,
            ars_weight: row.try_get("ars_weight")?,
            evs_weight: row.try_get("evs_weight")?,
            trs_weight: row.try_get("trs_weight")?,
            segment_type,
            segment_key: row.try_get("segment_key")?,
            sample_size: sample_size.max(0) as u64,
            is_validated: row.try_get("is_validated")?,
        }))
    }
}
