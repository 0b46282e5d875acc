// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Store Implementations
//!
//! Infrastructure implementations of the persistence contracts defined in
//! `crate::domain::repository`.
//!
//! ## PostgreSQL
//! - **PostgresWeightStore** - `segment_weights` lookups
//! - **PostgresTransactionStore** - decision, post and follow-up writes in one
//!   `sqlx` transaction
//!
//! ## In-Memory
//! Lightweight implementations for tests, development and `bellwether simulate`:
//! - **InMemoryWeightStore** - HashMap-backed, with fetch counting, optional
//!   latency and injected failures
//! - **InMemoryTransactionStore** - stages writes per transaction and applies
//!   them on commit, with per-step failure injection

pub mod postgres_decisions;
pub mod postgres_weights;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::decision::Decision;
use crate::domain::follow_up::FollowUp;
use crate::domain::post::PostId;
use crate::domain::repository::{DecisionTransaction, RepositoryError, TransactionStore, WeightStore};
use crate::domain::weights::WeightVector;

#[derive(Clone, Default)]
pub struct InMemoryWeightStore {
    weights: Arc<RwLock<HashMap<String, WeightVector>>>,
    fetches: Arc<AtomicU64>,
    failures_pending: Arc<AtomicU32>,
    delay: Option<Duration>,
}

impl InMemoryWeightStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every lookup sleeps for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Store under the vector's own `segment_key`
    pub fn insert(&self, weights: WeightVector) {
        self.weights.write().insert(weights.segment_key.clone(), weights);
    }

    pub fn remove(&self, segment_key: &str) -> Option<WeightVector> {
        self.weights.write().remove(segment_key)
    }

    pub fn len(&self) -> usize {
        self.weights.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.read().is_empty()
    }

    /// Number of `find_by_segment_key` calls so far
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Make the next `n` lookups return a database error
    pub fn fail_next_fetches(&self, n: u32) {
        self.failures_pending.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl WeightStore for InMemoryWeightStore {
    async fn find_by_segment_key(&self, key: &str) -> Result<Option<WeightVector>, RepositoryError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let injected = self
            .failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(RepositoryError::Database("injected weight store failure".to_string()));
        }

        Ok(self.weights.read().get(key).cloned())
    }
}

/// Transaction step that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStep {
    Begin,
    CreateDecision,
    MarkPostProcessed,
    CreateFollowUps,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct Writes {
    decisions: Vec<Decision>,
    processed: HashMap<PostId, DateTime<Utc>>,
    follow_ups: Vec<FollowUp>,
}

#[derive(Clone, Default)]
pub struct InMemoryTransactionStore {
    committed: Arc<RwLock<Writes>>,
    fail_on: Arc<Mutex<Option<TransactionStep>>>,
    commits: Arc<AtomicU64>,
    rollbacks: Arc<AtomicU64>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every transaction at `step` until [`Self::clear_failure`]
    pub fn fail_on(&self, step: TransactionStep) {
        *self.fail_on.lock() = Some(step);
    }

    pub fn clear_failure(&self) {
        *self.fail_on.lock() = None;
    }

    pub fn decisions(&self) -> Vec<Decision> {
        self.committed.read().decisions.clone()
    }

    pub fn decision_for_post(&self, post_id: PostId) -> Option<Decision> {
        self.committed
            .read()
            .decisions
            .iter()
            .find(|d| d.post_id == post_id)
            .cloned()
    }

    pub fn processed_at(&self, post_id: PostId) -> Option<DateTime<Utc>> {
        self.committed.read().processed.get(&post_id).copied()
    }

    pub fn follow_ups(&self) -> Vec<FollowUp> {
        self.committed.read().follow_ups.clone()
    }

    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn begin(&self) -> Result<Box<dyn DecisionTransaction>, RepositoryError> {
        let fail_on = *self.fail_on.lock();
        if fail_on == Some(TransactionStep::Begin) {
            return Err(RepositoryError::Transaction("injected failure at begin".to_string()));
        }
        Ok(Box::new(InMemoryDecisionTransaction {
            store: self.clone(),
            staged: Writes::default(),
            fail_on,
        }))
    }
}

pub struct InMemoryDecisionTransaction {
    store: InMemoryTransactionStore,
    staged: Writes,
    fail_on: Option<TransactionStep>,
}

impl InMemoryDecisionTransaction {
    fn check(&self, step: TransactionStep) -> Result<(), RepositoryError> {
        if self.fail_on == Some(step) {
            return Err(RepositoryError::Database(format!("injected failure at {:?}", step)));
        }
        Ok(())
    }
}

#[async_trait]
impl DecisionTransaction for InMemoryDecisionTransaction {
    async fn create_decision(&mut self, decision: &Decision) -> Result<(), RepositoryError> {
        self.check(TransactionStep::CreateDecision)?;
        self.staged.decisions.push(decision.clone());
        Ok(())
    }

    async fn mark_post_processed(&mut self, post_id: PostId, processed_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        self.check(TransactionStep::MarkPostProcessed)?;
        self.staged.processed.insert(post_id, processed_at);
        Ok(())
    }

    async fn create_follow_ups(&mut self, follow_ups: &[FollowUp]) -> Result<(), RepositoryError> {
        self.check(TransactionStep::CreateFollowUps)?;
        self.staged.follow_ups.extend_from_slice(follow_ups);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        if self.fail_on == Some(TransactionStep::Commit) {
            return Err(RepositoryError::Transaction("injected failure at commit".to_string()));
        }
        let InMemoryDecisionTransaction { store, staged, .. } = *self;
        {
            let mut committed = store.committed.write();
            committed.decisions.extend(staged.decisions);
            committed.processed.extend(staged.processed);
            committed.follow_ups.extend(staged.follow_ups);
        }
        store.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        self.store.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::decision::fixtures::decision;
    use crate::domain::mode::OperatingMode;

    #[tokio::test]
    async fn test_writes_invisible_until_commit() {
        let store = InMemoryTransactionStore::new();
        let d = decision(OperatingMode::Engagement);

        let mut tx = store.begin().await.unwrap();
        tx.create_decision(&d).await.unwrap();
        tx.mark_post_processed(d.post_id, Utc::now()).await.unwrap();
        assert!(store.decisions().is_empty());

        tx.commit().await.unwrap();
        assert_eq!(store.decision_for_post(d.post_id).map(|x| x.id), Some(d.id));
        assert!(store.processed_at(d.post_id).is_some());
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_writes() {
        let store = InMemoryTransactionStore::new();
        let d = decision(OperatingMode::Helpful);

        let mut tx = store.begin().await.unwrap();
        tx.create_decision(&d).await.unwrap();
        tx.rollback().await.unwrap();

        assert!(store.decisions().is_empty());
        assert_eq!(store.rollbacks(), 1);
    }

    #[tokio::test]
    async fn test_begin_failure_is_injected() {
        let store = InMemoryTransactionStore::new();
        store.fail_on(TransactionStep::Begin);
        assert!(matches!(store.begin().await, Err(RepositoryError::Transaction(_))));
        store.clear_failure();
        assert!(store.begin().await.is_ok());
    }

    #[tokio::test]
    async fn test_weight_store_counts_and_fails_on_demand() {
        let store = InMemoryWeightStore::new();
        store.insert(WeightVector::global_default());
        store.fail_next_fetches(1);

        assert!(store.find_by_segment_key("GLOBAL").await.is_err());
        assert!(store.find_by_segment_key("GLOBAL").await.unwrap().is_some());
        assert!(store.find_by_segment_key("reddit").await.unwrap().is_none());
        assert_eq!(store.fetch_count(), 3);
    }
}
