// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Persistence Contracts
//!
//! Narrow interfaces the engine needs from storage, defined in the domain
//! layer and implemented in `crate::infrastructure::repositories`.
//!
//! | Trait | Purpose | Implementations |
//! |-------|---------|-----------------|
//! | `WeightStore` | Segment weight lookup | `InMemoryWeightStore`, `PostgresWeightStore` |
//! | `TransactionStore` | Atomic decision writes | `InMemoryTransactionStore`, `PostgresTransactionStore` |
//!
//! ## Storage Backend Abstraction
//!
//! The backend is selected at startup from configuration: in-memory stores
//! for development and tests, PostgreSQL for production.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::decision::Decision;
use crate::domain::follow_up::FollowUp;
use crate::domain::post::PostId;
use crate::domain::weights::WeightVector;

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
    pub max_connections: u32,
}

/// Read-only access to learned segment weights
#[async_trait]
pub trait WeightStore: Send + Sync {
    /// Find the weight vector stored under `key`, if any
    async fn find_by_segment_key(&self, key: &str) -> Result<Option<WeightVector>, RepositoryError>;
}

/// Opens transactions for decision persistence
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn DecisionTransaction>, RepositoryError>;
}

/// One open unit of work. Nothing is visible to other readers until
/// `commit`; dropping without committing discards every write.
#[async_trait]
pub trait DecisionTransaction: Send {
    async fn create_decision(&mut self, decision: &Decision) -> Result<(), RepositoryError>;

    /// Set `processed_at` on the source post
    async fn mark_post_processed(&mut self, post_id: PostId, processed_at: DateTime<Utc>) -> Result<(), RepositoryError>;

    async fn create_follow_ups(&mut self, follow_ups: &[FollowUp]) -> Result<(), RepositoryError>;

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Transaction error: {0}")]
    Transaction(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
