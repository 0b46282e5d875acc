// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory
//!
//! Creates concrete store implementations based on the storage backend
//! selected from configuration. Domain code only sees the traits.

use std::sync::Arc;

use crate::domain::config::EngineConfig;
use crate::domain::repository::{PostgresConfig, StorageBackend, TransactionStore, WeightStore};
use crate::infrastructure::db::Database;
use crate::infrastructure::repositories::postgres_decisions::PostgresTransactionStore;
use crate::infrastructure::repositories::postgres_weights::PostgresWeightStore;
use crate::infrastructure::repositories::{InMemoryTransactionStore, InMemoryWeightStore};

/// PostgreSQL when a database section is configured, otherwise in-memory
pub fn storage_backend(config: &EngineConfig) -> StorageBackend {
    match &config.database {
        Some(db) => StorageBackend::PostgreSQL(PostgresConfig {
            connection_string: db.url.clone(),
            max_connections: db.max_connections,
        }),
        None => StorageBackend::InMemory,
    }
}

/// Creates a WeightStore implementation based on the configured backend.
///
/// `database` must be `Some` for the PostgreSQL backend; a missing pool
/// degrades to the in-memory store.
pub fn create_weight_store(backend: &StorageBackend, database: Option<&Database>) -> Arc<dyn WeightStore> {
    match (backend, database) {
        (StorageBackend::PostgreSQL(_), Some(db)) => Arc::new(PostgresWeightStore::new(db.get_pool().clone())),
        (StorageBackend::PostgreSQL(_), None) => {
            tracing::warn!("PostgreSQL backend configured without a connection, using in-memory weight store");
            Arc::new(InMemoryWeightStore::new())
        }
        (StorageBackend::InMemory, _) => Arc::new(InMemoryWeightStore::new()),
    }
}

/// Creates a TransactionStore implementation based on the configured backend
pub fn create_transaction_store(backend: &StorageBackend, database: Option<&Database>) -> Arc<dyn TransactionStore> {
    match (backend, database) {
        (StorageBackend::PostgreSQL(_), Some(db)) => Arc::new(PostgresTransactionStore::new(db.get_pool().clone())),
        (StorageBackend::PostgreSQL(_), None) => {
            tracing::warn!("PostgreSQL backend configured without a connection, using in-memory transaction store");
            Arc::new(InMemoryTransactionStore::new())
        }
        (StorageBackend::InMemory, _) => Arc::new(InMemoryTransactionStore::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::DatabaseConfig;
    use crate::domain::post::PostId;
    use chrono::Utc;

    fn postgres_backend() -> StorageBackend {
        StorageBackend::PostgreSQL(PostgresConfig {
            connection_string: "postgres://localhost/bellwether".to_string(),
            max_connections: 1,
        })
    }

    #[tokio::test]
    async fn test_in_memory_transaction_store_without_database() {
        for backend in [StorageBackend::InMemory, postgres_backend()] {
            let store = create_transaction_store(&backend, None);
            let mut tx = store.begin().await.unwrap();
            tx.mark_post_processed(PostId::new(), Utc::now()).await.unwrap();
            tx.create_follow_ups(&[]).await.unwrap();
            tx.commit().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_in_memory_weight_store_without_database() {
        for backend in [StorageBackend::InMemory, postgres_backend()] {
            let store = create_weight_store(&backend, None);
            assert!(store.find_by_segment_key("twitter:morning").await.unwrap().is_none());
        }
    }

    #[test]
    fn test_backend_follows_database_section() {
        let mut config = EngineConfig::default();
        assert!(matches!(storage_backend(&config), StorageBackend::InMemory));

        config.database = Some(DatabaseConfig {
            url: "postgres://localhost/bellwether".to_string(),
            max_connections: 3,
        });
        match storage_backend(&config) {
            StorageBackend::PostgreSQL(pg) => {
                assert_eq!(pg.connection_string, "postgres://localhost/bellwether");
                assert_eq!(pg.max_connections, 3);
            }
            other => panic!("unexpected backend {:?}", other),
        }
    }
}
