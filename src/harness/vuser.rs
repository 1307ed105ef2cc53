// Virtual user module
//
// One simulated client: sleeps until its activation offset, then issues
// chat requests back-to-back until the run's cancellation flag is set.
// Each user runs as an independent task and never blocks on another.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::gateway::ChatGateway;
use crate::prompts::PromptPool;
use crate::stats::StatsCollector;

pub struct VirtualUser {
    id: u64,
    activation: Duration,
    gateway: Arc<dyn ChatGateway>,
    prompts: Arc<PromptPool>,
    stats: Arc<StatsCollector>,
    cancel: Arc<AtomicBool>,
}

impl VirtualUser {
    pub fn new(
        id: u64,
        activation: Duration,
        gateway: Arc<dyn ChatGateway>,
        prompts: Arc<PromptPool>,
        stats: Arc<StatsCollector>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id,
            activation,
            gateway,
            prompts,
            stats,
            cancel,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Drive the request loop until cancellation is observed.
    ///
    /// The flag is checked before each new request only; an in-flight
    /// request is allowed to complete or fail naturally. Every outcome,
    /// success or failure, is appended to the run's collector.
    pub async fn run(self) {
        tokio::time::sleep(self.activation).await;

        if self.cancel.load(Ordering::Relaxed) {
            return;
        }

        self.stats.increment_active_users();
        tracing::debug!(user = self.id, "virtual user activated");

        while !self.cancel.load(Ordering::Relaxed) {
            let prompt = self.prompts.next_prompt();
            let start = Instant::now();
            match self.gateway.send_chat(prompt).await {
                Ok(reply) => self.stats.record_success(reply.status, start.elapsed()),
                Err(e) => self.stats.record_failure(&e.kind(), start.elapsed()),
            }
        }

        self.stats.decrement_active_users();
        tracing::debug!(user = self.id, "virtual user stopped");
    }
}
