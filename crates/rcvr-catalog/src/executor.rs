//! ---
//! rcvr_section: "01-core-functionality"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Executor contract for recovery procedures."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use std::fmt;
use std::future::Future;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::result::{RecoveryContext, RecoveryResult};

/// Performs the remediation work of a procedure.
///
/// Expected failures are reported as `Ok(RecoveryResult { success: false, .. })`.
/// `Err` is reserved for unexpected errors and is recorded as an incident error.
#[async_trait]
pub trait RecoveryExecutor: Send + Sync {
    async fn execute(&self, context: &RecoveryContext) -> Result<RecoveryResult>;
}

type ExecutorFn = dyn Fn(RecoveryContext) -> BoxFuture<'static, Result<RecoveryResult>> + Send + Sync;

/// Adapts an async closure into a [`RecoveryExecutor`].
pub struct FnExecutor {
    inner: Box<ExecutorFn>,
}

impl FnExecutor {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(RecoveryContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RecoveryResult>> + Send + 'static,
    {
        Self {
            inner: Box::new(move |context| Box::pin(f(context))),
        }
    }
}

impl fmt::Debug for FnExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnExecutor")
    }
}

#[async_trait]
impl RecoveryExecutor for FnExecutor {
    async fn execute(&self, context: &RecoveryContext) -> Result<RecoveryResult> {
        (self.inner)(context.clone()).await
    }
}
