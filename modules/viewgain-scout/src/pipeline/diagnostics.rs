use std::fmt;
use std::sync::{Arc, Mutex};

/// Why a handle or post dropped out of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    IdentityNotFound,
    NoPosts,
    FetchFailed,
    ExtractionDegraded,
    BudgetExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub handle: String,
    pub post_id: Option<String>,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn account(handle: &str, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            handle: handle.to_string(),
            post_id: None,
            kind,
            message: message.into(),
        }
    }

    pub fn post(handle: &str, post_id: &str, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            handle: handle.to_string(),
            post_id: Some(post_id.to_string()),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.post_id {
            Some(id) => write!(f, "@{} post {}: {}", self.handle, id, self.message),
            None => write!(f, "@{}: {}", self.handle, self.message),
        }
    }
}

/// Append-only collector shared by account workers.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    inner: Arc<Mutex<Vec<Diagnostic>>>,
}

impl Diagnostics {
    pub fn push(&self, diagnostic: Diagnostic) {
        // A panicked worker must not hide everyone else's diagnostics.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(
            &mut *self
                .inner
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}
