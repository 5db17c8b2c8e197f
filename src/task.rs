//! DNS 轮询任务的创建参数

use std::thread::JoinHandle;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// How a background task should be run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSpec {
    pub name: String,
    /// bytes
    pub stack_size: usize,
    pub priority: u8,
    /// core to pin to, `None` lets the scheduler pick
    pub core: Option<u8>,
}

impl Default for TaskSpec {
    fn default() -> Self {
        Self {
            name: "CaptiveDnsServ".to_string(),
            // 2KB was plenty for the DNS loop in high watermark tests
            stack_size: 2 * 1024,
            priority: 1,
            core: Some(0),
        }
    }
}

pub type TaskEntry = Box<dyn FnOnce() + Send + 'static>;

pub trait TaskSpawner {
    fn spawn(&self, spec: &TaskSpec, entry: TaskEntry) -> anyhow::Result<JoinHandle<()>>;
}

/// Plain `std::thread` spawner. Priority and affinity are not available
/// through std and are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdSpawner;

impl TaskSpawner for StdSpawner {
    fn spawn(&self, spec: &TaskSpec, entry: TaskEntry) -> anyhow::Result<JoinHandle<()>> {
        log::debug!(
            "Spawning {} (stack {}B, priority {} and core {:?} ignored)",
            spec.name,
            spec.stack_size,
            spec.priority,
            spec.core
        );
        std::thread::Builder::new()
            .name(spec.name.clone())
            .stack_size(spec.stack_size)
            .spawn(entry)
            .with_context(|| format!("Failed to spawn {} thread", spec.name))
    }
}
