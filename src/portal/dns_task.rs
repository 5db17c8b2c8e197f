//! 后台 DNS 轮询任务

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::dns::DnsResponder;
use crate::task::{TaskSpawner, TaskSpec};

/// Background loop driving a non-blocking [`DnsResponder`].
///
/// Lives for exactly one portal episode. [`DnsPollTask::stop`] consumes it, so
/// a handle cannot be reused for the next episode.
pub struct DnsPollTask {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DnsPollTask {
    pub fn spawn<D, T>(
        spawner: &T,
        spec: &TaskSpec,
        responder: Arc<Mutex<D>>,
        interval: Duration,
    ) -> anyhow::Result<Self>
    where
        D: DnsResponder,
        T: TaskSpawner + ?Sized,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_ = stop.clone();
        let handle = spawner.spawn(
            spec,
            Box::new(move || poll_loop(&responder, &stop_, interval)),
        )?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Signal the loop and wait for it to exit, so the responder is no longer
    /// touched once this returns.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.stop.store(true, Ordering::Release);
        handle.thread().unpark();
        if handle.join().is_err() {
            log::error!("Captive portal DNS task panicked");
        }
    }
}

impl Drop for DnsPollTask {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn poll_loop<D: DnsResponder>(responder: &Mutex<D>, stop: &AtomicBool, interval: Duration) {
    log::debug!("Captive portal DNS update task started.");

    // the flag is never cleared, so a stop stored at any point is seen here
    while !stop.load(Ordering::Acquire) {
        let r = responder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .process_next_request();
        if let Err(e) = r {
            log::warn!("Captive portal DNS error: {:?}", e);
        }
        std::thread::park_timeout(interval);
    }

    log::debug!("Captive portal DNS update task shutting down...");
}
