//! Strict-equality consensus over non-deterministic executions.
//!
//! A `NondetTask` is run once as leader, then independently re-run by the
//! remaining validators. The leader's output is accepted only when enough
//! executions produced byte-identical output. A failed execution never
//! agrees with anything.

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, warn};

/// A non-deterministic computation whose output validators compare.
#[async_trait]
pub trait NondetTask: Send + Sync {
    async fn run(&self) -> Result<String>;

    /// Short label for logs.
    fn label(&self) -> &str {
        "nondet-task"
    }
}

/// Forces independent executions of a task to agree on one result.
#[async_trait]
pub trait ConsensusNormalizer: Send + Sync {
    /// Return the agreed output, or fail if no consensus is reached.
    async fn strict_eq(&self, task: &dyn NondetTask) -> Result<String>;
}

/// Local validator set: re-executes the task `validators` times on this
/// node and requires `quorum` byte-identical outputs (leader included).
#[derive(Debug, Clone, Copy)]
pub struct ValidatorQuorum {
    validators: usize,
    quorum: usize,
}

impl ValidatorQuorum {
    pub fn new(validators: usize, quorum: usize) -> Result<Self> {
        if validators == 0 {
            anyhow::bail!("Validator count must be at least 1");
        }
        if quorum == 0 || quorum > validators {
            anyhow::bail!("Quorum must be between 1 and {validators}, got {quorum}");
        }
        Ok(Self { validators, quorum })
    }

    /// Every execution must agree.
    pub fn unanimous(validators: usize) -> Result<Self> {
        Self::new(validators, validators)
    }

    pub fn validators(&self) -> usize {
        self.validators
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }
}

#[async_trait]
impl ConsensusNormalizer for ValidatorQuorum {
    async fn strict_eq(&self, task: &dyn NondetTask) -> Result<String> {
        let label = task.label().to_string();

        let leader = match task.run().await {
            Ok(out) => out,
            Err(e) => {
                warn!(task = %label, error = %e, "Leader execution failed");
                return Err(e.context(format!("Leader execution of {label} failed")));
            }
        };
        debug!(task = %label, output = %leader, "Leader proposed result");

        let runs = join_all((1..self.validators).map(|_| task.run())).await;

        let mut agreed = 1usize;
        for (i, run) in runs.iter().enumerate() {
            match run {
                Ok(out) if *out == leader => agreed += 1,
                Ok(out) => {
                    warn!(task = %label, validator = i + 1, output = %out, "Validator disagreed");
                }
                Err(e) => {
                    warn!(task = %label, validator = i + 1, error = %e, "Validator execution failed");
                }
            }
        }

        if agreed < self.quorum {
            anyhow::bail!(
                "No consensus for {label}: {agreed}/{} executions agreed, quorum is {}",
                self.validators,
                self.quorum
            );
        }

        info!(
            task = %label,
            agreed,
            validators = self.validators,
            quorum = self.quorum,
            "Consensus reached"
        );
        Ok(leader)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
