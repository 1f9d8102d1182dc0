use otel_manifests::{BuildError, ResourceKind};
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("failed to render desired objects: {0}")]
    Build(#[from] BuildError),

    #[error("conflicting concurrent update: {0}")]
    Conflict(String),

    #[error("object store request failed: {0}")]
    Store(StoreError),

    #[error("reconcile pass cancelled")]
    Cancelled,

    #[error("{}", describe(.0))]
    Kinds(Vec<KindFailure>),

    #[error("kubernetes request failed: {0}")]
    Kube(kube::Error),
}

/// Failure of one resource kind within a pass.
#[derive(Debug)]
pub struct KindFailure {
    pub kind: ResourceKind,
    pub error: ReconcileError,
}

fn describe(failures: &[KindFailure]) -> String {
    let parts: Vec<String> = failures
        .iter()
        .map(|failure| format!("{}: {}", failure.kind, failure.error))
        .collect();
    format!("reconcile failed for {}", parts.join("; "))
}

impl From<StoreError> for ReconcileError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict(message) => ReconcileError::Conflict(message),
            other => ReconcileError::Store(other),
        }
    }
}

impl From<kube::Error> for ReconcileError {
    fn from(error: kube::Error) -> Self {
        match error {
            kube::Error::Api(response) if response.code == 409 => {
                ReconcileError::Conflict(response.message)
            }
            other => ReconcileError::Kube(other),
        }
    }
}

impl ReconcileError {
    /// Conflicts are retried quickly by re-running the whole pass.
    pub fn is_conflict(&self) -> bool {
        match self {
            ReconcileError::Conflict(_) => true,
            ReconcileError::Kinds(failures) => {
                failures.iter().any(|failure| failure.error.is_conflict())
            }
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            ReconcileError::Cancelled => true,
            ReconcileError::Kinds(failures) => {
                failures.iter().any(|failure| failure.error.is_cancelled())
            }
            _ => false,
        }
    }
}
