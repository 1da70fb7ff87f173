use crate::error::ScoringError;
use crate::models::{RawResponse, ScoringRequest};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait ScoringService: Send + Sync {
    async fn score(&self, request: &ScoringRequest) -> Result<RawResponse, ScoringError>;
}

#[async_trait]
impl<S> ScoringService for Arc<S>
where
    S: ScoringService + ?Sized,
{
    async fn score(&self, request: &ScoringRequest) -> Result<RawResponse, ScoringError> {
        self.as_ref().score(request).await
    }
}
