//! Text-completion capability: the external reasoning service behind the
//! parse and decide stages of the query pipeline.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::types::PolicyError;

/// Prompt in, free text out. The text is *expected* to often contain JSON,
/// but the pipeline never assumes it does; malformed output degrades to a
/// needs-review decision downstream.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, PolicyError>;
}

/// Test double that replays a queue of canned responses in order.
///
/// An exhausted queue fails with [`PolicyError::ExternalService`], which is
/// also how tests simulate transport failure.
#[derive(Debug, Default)]
pub struct ScriptedCompletionProvider {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedCompletionProvider {
    pub fn new(responses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
        }
    }

    /// A provider whose every call fails, for exercising degraded paths.
    pub fn failing() -> Self {
        Self::default()
    }

    /// Queue another response after construction.
    pub fn push(&self, response: impl Into<String>) {
        self.responses.lock().push_back(response.into());
    }

    /// Number of responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletionProvider {
    async fn complete(&self, _prompt: &str) -> Result<String, PolicyError> {
        self.responses.lock().pop_front().ok_or_else(|| {
            PolicyError::ExternalService("completion provider unavailable".to_string())
        })
    }
}
