//! 按指定栈、优先级和核心创建 FreeRTOS 任务

use std::thread::JoinHandle;

use anyhow::Context;
use esp_idf_svc::hal::{cpu::Core, task::thread::ThreadSpawnConfiguration};

use crate::task::{TaskEntry, TaskSpawner, TaskSpec};

/// Spawns std threads as FreeRTOS tasks with the requested stack, priority and
/// core.
#[derive(Debug, Clone, Copy, Default)]
pub struct PinnedSpawner;

fn core_of(index: u8) -> Option<Core> {
    match index {
        0 => Some(Core::Core0),
        #[cfg(any(esp32, esp32s3))]
        1 => Some(Core::Core1),
        _ => None,
    }
}

impl TaskSpawner for PinnedSpawner {
    fn spawn(&self, spec: &TaskSpec, entry: TaskEntry) -> anyhow::Result<JoinHandle<()>> {
        let conf = ThreadSpawnConfiguration {
            stack_size: spec.stack_size,
            priority: spec.priority,
            pin_to_core: spec.core.and_then(core_of),
            ..Default::default()
        };
        conf.set()
            .map_err(|e| anyhow::anyhow!("Failed to set thread spawn configuration: {:?}", e))?;

        let r = std::thread::Builder::new()
            .name(spec.name.clone())
            .stack_size(spec.stack_size)
            .spawn(entry);

        // later std threads must not inherit the DNS task settings
        if let Err(e) = ThreadSpawnConfiguration::default().set() {
            log::warn!("Failed to restore thread spawn configuration: {:?}", e);
        }

        r.with_context(|| format!("Failed to spawn {} task", spec.name))
    }
}
