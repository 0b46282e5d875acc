// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Fixed-value signal providers.
//!
//! The real analyzers live outside this crate. These adapters answer every
//! post with a preset value (or a preset error) and back `bellwether
//! simulate` and the engine's tests.

use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::application::decision_engine::SignalProviders;
use crate::domain::post::{Author, Post};
use crate::domain::signal::{SignalBundle, SignalError, SignalSource};

#[derive(Debug, Clone)]
pub struct StaticSignalSource<T> {
    value: T,
}

impl<T> StaticSignalSource<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

#[async_trait]
impl<T> SignalSource<T> for StaticSignalSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn fetch(&self, _post: &Post, _author: &Author) -> Result<T, SignalError> {
        Ok(self.value.clone())
    }
}

/// Always fails with [`SignalError::Unavailable`]
#[derive(Debug)]
pub struct UnavailableSignalSource<T> {
    reason: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> UnavailableSignalSource<T> {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T> SignalSource<T> for UnavailableSignalSource<T>
where
    T: Send + 'static,
{
    async fn fetch(&self, _post: &Post, _author: &Author) -> Result<T, SignalError> {
        Err(SignalError::Unavailable(self.reason.clone()))
    }
}

/// Providers answering every post with the values in `bundle`
pub fn static_providers(bundle: SignalBundle) -> SignalProviders {
    SignalProviders {
        intent: Arc::new(StaticSignalSource::new(bundle.intent)),
        author: Arc::new(StaticSignalSource::new(bundle.author)),
        velocity: Arc::new(StaticSignalSource::new(bundle.velocity)),
        topic: Arc::new(StaticSignalSource::new(bundle.topic)),
        safety: Arc::new(StaticSignalSource::new(bundle.safety)),
        power_user: Arc::new(StaticSignalSource::new(bundle.power_user)),
        competitor: Arc::new(StaticSignalSource::new(bundle.competitor)),
        temporal: Arc::new(StaticSignalSource::new(bundle.temporal)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::post::Platform;
    use crate::domain::signal::TopicSignal;

    fn post_and_author() -> (Post, Author) {
        let author = Author::new(Platform::Reddit, "someone");
        let post = Post::new(Platform::Reddit, "t3_abc", author.id, "any good tools for this?");
        (post, author)
    }

    #[test]
    fn test_static_source_returns_preset_value() {
        let (post, author) = post_and_author();
        let source = StaticSignalSource::new(TopicSignal {
            score: 0.8,
            confidence: 0.9,
            matched_topics: vec!["tooling".to_string()],
        });

        let topic = tokio_test::block_on(source.fetch(&post, &author)).unwrap();
        assert_eq!(topic.score, 0.8);
        assert_eq!(topic.matched_topics, vec!["tooling".to_string()]);
    }

    #[test]
    fn test_unavailable_source_reports_reason() {
        let (post, author) = post_and_author();
        let source = UnavailableSignalSource::<TopicSignal>::new("classifier offline");

        let err = tokio_test::block_on(source.fetch(&post, &author)).unwrap_err();
        assert!(matches!(err, SignalError::Unavailable(ref reason) if reason == "classifier offline"));
    }

    #[test]
    fn test_static_providers_serve_bundle() {
        let (post, author) = post_and_author();
        let bundle = SignalBundle::fallback();
        let providers = static_providers(bundle.clone());

        let safety = tokio_test::block_on(providers.safety.fetch(&post, &author)).unwrap();
        assert_eq!(safety, bundle.safety);
    }
}
