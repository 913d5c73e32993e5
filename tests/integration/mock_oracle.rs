//! Scripted oracle for integration testing.
//!
//! Provides a deterministic `Oracle` implementation that serves a fixed
//! page and hands out queued model answers, one per prompt. All state is
//! in-memory with no network access.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use football_bets::nondet::{Oracle, RenderMode};

/// A scripted oracle whose answers are fully controllable from test code.
///
/// Answers are consumed in call order. Once the queue is down to its last
/// entry, that entry is repeated for every further prompt.
pub struct ScriptedOracle {
    page: String,
    answers: Mutex<VecDeque<Result<String, String>>>,
    rendered_urls: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
    /// If set, every page render fails with this message.
    render_error: Mutex<Option<String>>,
}

impl ScriptedOracle {
    /// An oracle that gives the same answer to every prompt.
    pub fn answering(answer: &str) -> Self {
        Self::with_answers(vec![Ok(answer.to_string())])
    }

    /// An oracle with a sequence of answers; `Err` entries fail the prompt.
    pub fn with_answers(answers: Vec<Result<String, String>>) -> Self {
        Self {
            page: "Premier League. Arsenal 2 - 1 Chelsea. Full time.".to_string(),
            answers: Mutex::new(answers.into()),
            rendered_urls: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            render_error: Mutex::new(None),
        }
    }

    /// Replace the remaining answers.
    pub fn set_answers(&self, answers: Vec<Result<String, String>>) {
        *self.answers.lock().unwrap() = answers.into();
    }

    /// Force all subsequent page renders to fail.
    pub fn set_render_error(&self, msg: &str) {
        *self.render_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn rendered_urls(&self) -> Vec<String> {
        self.rendered_urls.lock().unwrap().clone()
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }

    fn next_answer(&self) -> Result<String, String> {
        let mut answers = self.answers.lock().unwrap();
        if answers.len() > 1 {
            answers.pop_front().unwrap_or_else(|| Err("no answer scripted".to_string()))
        } else {
            answers
                .front()
                .cloned()
                .unwrap_or_else(|| Err("no answer scripted".to_string()))
        }
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn render_page(&self, url: &str, _mode: RenderMode) -> Result<String> {
        self.rendered_urls.lock().unwrap().push(url.to_string());
        if let Some(msg) = self.render_error.lock().unwrap().clone() {
            return Err(anyhow!("{msg}"));
        }
        Ok(self.page.clone())
    }

    async fn exec_prompt(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.next_answer().map_err(|msg| anyhow!("{msg}"))
    }
}
