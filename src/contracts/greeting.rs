//! Greeting store: a single message anyone can read or replace.

use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_GREETING: &str = "Hello GenLayer!";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetingStore {
    message: String,
}

impl Default for GreetingStore {
    fn default() -> Self {
        Self { message: DEFAULT_GREETING.to_string() }
    }
}

impl GreetingStore {
    pub fn get_message(&self) -> &str {
        &self.message
    }

    pub fn set_message(&mut self, new_message: String) {
        info!(len = new_message.len(), "Greeting updated");
        self.message = new_message;
    }
}
