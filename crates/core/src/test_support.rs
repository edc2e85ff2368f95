//! Fakes shared by the unit tests.

use crate::error::Result;
use crate::llm::LanguageModel;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Replays scripted responses in order, then repeats `default`.
pub(crate) struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String>>>,
    default: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub(crate) fn new(responses: Vec<Result<String>>, default: &str) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            default: default.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn prompt_count(&self) -> usize {
        self.prompts.lock().map(|prompts| prompts.len()).unwrap_or_default()
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|prompts| prompts.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let next = self.responses.lock().ok().and_then(|mut queue| queue.pop_front());
        next.unwrap_or_else(|| Ok(self.default.clone()))
    }
}
