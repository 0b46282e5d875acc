// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};

use crate::domain::decision::Decision;
use crate::domain::follow_up::FollowUp;
use crate::domain::post::PostId;
use crate::domain::repository::{DecisionTransaction, RepositoryError, TransactionStore};

/// Opens PostgreSQL transactions for decision persistence.
pub struct PostgresTransactionStore {
    pool: PgPool,
}

impl PostgresTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for PostgresTransactionStore {
    async fn begin(&self) -> Result<Box<dyn DecisionTransaction>, RepositoryError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::Transaction(format!("Failed to begin transaction: {}", e)))?;
        Ok(Box::new(PostgresDecisionTransaction { tx }))
    }
}

/// Dropping the inner `sqlx::Transaction` without commit rolls it back.
pub struct PostgresDecisionTransaction {
    tx: Transaction<'static, Postgres>,
}

fn rule_name(decision: &Decision) -> Result<String, RepositoryError> {
    let value = serde_json::to_value(decision.decision_rule)?;
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| RepositoryError::Serialization("decision rule is not a string".to_string()))
}

#[async_trait]
impl DecisionTransaction for PostgresDecisionTransaction {
    async fn create_decision(&mut self, decision: &Decision) -> Result<(), RepositoryError> {
        let probabilities = serde_json::to_value(decision.mode_probabilities)?;
        let safety_flags = serde_json::to_value(&decision.safety_flags)?;
        let temporal_context = serde_json::to_value(&decision.temporal_context)?;
        let degraded_signals = serde_json::to_value(&decision.degraded_signals)?;

        sqlx::query(
            r#"
            INSERT INTO decisions (
                id, post_id, platform, composite_score, ci_lower, ci_upper,
                mode, mode_confidence, mode_probabilities, decision_rule,
                segment_used, segment_type, archetype, competitor_detected, competitor_name,
                is_power_user, needs_review, review_reason, safety_flags, temporal_context,
                degraded_signals, decided_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
            "#,
        )
        .bind(decision.id.0)
        .bind(decision.post_id.0)
        .bind(decision.platform.as_str())
        .bind(decision.composite_score)
        .bind(decision.credible_interval.lower)
        .bind(decision.credible_interval.upper)
        .bind(decision.mode.as_str())
        .bind(decision.mode_confidence)
        .bind(&probabilities)
        .bind(rule_name(decision)?)
        .bind(&decision.segment_used)
        .bind(decision.segment_type.as_str())
        .bind(&decision.archetype)
        .bind(decision.competitor_detected)
        .bind(&decision.competitor_name)
        .bind(decision.is_power_user)
        .bind(decision.needs_review)
        .bind(decision.review_reason.map(|r| r.as_str()))
        .bind(&safety_flags)
        .bind(&temporal_context)
        .bind(&degraded_signals)
        .bind(decision.decided_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to insert decision: {}", e)))?;

        Ok(())
    }

    async fn mark_post_processed(&mut self, post_id: PostId, processed_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE posts SET processed_at = $2 WHERE id = $1")
            .bind(post_id.0)
            .bind(processed_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to mark post processed: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("post {}", post_id)));
        }
        Ok(())
    }

    async fn create_follow_ups(&mut self, follow_ups: &[FollowUp]) -> Result<(), RepositoryError> {
        for follow_up in follow_ups {
            sqlx::query(
                r#"
                INSERT INTO follow_ups (id, decision_id, post_id, kind, scheduled_for, payload)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(follow_up.id.0)
            .bind(follow_up.decision_id.0)
            .bind(follow_up.post_id.0)
            .bind(follow_up.kind.as_str())
            .bind(follow_up.scheduled_for)
            .bind(&follow_up.payload)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to insert follow-up: {}", e)))?;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx
            .commit()
            .await
            .map_err(|e| RepositoryError::Transaction(format!("Commit failed: {}", e)))
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| RepositoryError::Transaction(format!("Rollback failed: {}", e)))
    }
}
