//! Fallback port
//!
//! Caller-supplied recovery for the fallback failure policy: given the
//! error, the failed step, the task and the context, produce a replacement
//! step result.

use crate::use_cases::steps::{Step, StepError};
use async_trait::async_trait;
use council_domain::{Context, StepResult};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct FallbackError(pub String);

#[async_trait]
pub trait FallbackHandler: Send + Sync {
    async fn recover(
        &self,
        error: &StepError,
        step: &Step,
        task: &str,
        context: &Context,
    ) -> Result<StepResult, FallbackError>;
}

/// [`FallbackHandler`] backed by a plain closure
pub struct FnFallback<F>(F);

impl<F> FnFallback<F>
where
    F: Fn(&StepError, &Step, &str, &Context) -> Result<StepResult, FallbackError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> FallbackHandler for FnFallback<F>
where
    F: Fn(&StepError, &Step, &str, &Context) -> Result<StepResult, FallbackError> + Send + Sync,
{
    async fn recover(
        &self,
        error: &StepError,
        step: &Step,
        task: &str,
        context: &Context,
    ) -> Result<StepResult, FallbackError> {
        (self.0)(error, step, task, context)
    }
}
