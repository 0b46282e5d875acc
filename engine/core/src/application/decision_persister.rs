// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Decision Persister Application Service
//!
//! Writes a decision, the source post's `processed_at` and the decision's
//! follow-up work in one transaction. Any failed step rolls the whole unit
//! back and the error is returned to the caller; nothing is retried here.

use crate::domain::decision::Decision;
use crate::domain::metrics::{self, MetricsSink};
use crate::domain::post::Post;
use crate::domain::repository::{DecisionTransaction, RepositoryError, TransactionStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct DecisionPersister {
    store: Arc<dyn TransactionStore>,
    metrics: Arc<dyn MetricsSink>,
}

impl DecisionPersister {
    pub fn new(store: Arc<dyn TransactionStore>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { store, metrics }
    }

    pub async fn persist(&self, decision: &Decision, post: &Post) -> Result<(), RepositoryError> {
        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(e) => return Err(self.fail(decision, "begin", e)),
        };

        if let Err((step, e)) = Self::write_all(tx.as_mut(), decision, post).await {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(
                    decision_id = %decision.id,
                    error = %rollback_err,
                    "Rollback after failed decision write also failed"
                );
            }
            return Err(self.fail(decision, step, e));
        }

        if let Err(e) = tx.commit().await {
            return Err(self.fail(decision, "commit", e));
        }

        debug!(
            decision_id = %decision.id,
            post_id = %post.id,
            follow_ups = decision.follow_ups.len(),
            "Persisted decision"
        );
        Ok(())
    }

    async fn write_all(
        tx: &mut dyn DecisionTransaction,
        decision: &Decision,
        post: &Post,
    ) -> Result<(), (&'static str, RepositoryError)> {
        tx.create_decision(decision).await.map_err(|e| ("create_decision", e))?;
        tx.mark_post_processed(post.id, Utc::now())
            .await
            .map_err(|e| ("mark_post_processed", e))?;
        if !decision.follow_ups.is_empty() {
            tx.create_follow_ups(&decision.follow_ups)
                .await
                .map_err(|e| ("create_follow_ups", e))?;
        }
        Ok(())
    }

    fn fail(&self, decision: &Decision, step: &'static str, e: RepositoryError) -> RepositoryError {
        self.metrics.increment(metrics::DECISION_PERSIST_FAILURE, &[("step", step)]);
        error!(
            decision_id = %decision.id,
            post_id = %decision.post_id,
            step = step,
            error = %e,
            "Failed to persist decision, transaction aborted"
        );
        e
    }
}
