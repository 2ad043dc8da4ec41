//! The cooperative scheduler behind [`EventStream`](crate::EventStream).

use crate::producer::ProducerMode;
use rivulet_core::{StreamError, StreamResult};
use std::future::Future;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// How a producer is scheduled on the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheduler {
    /// Run on the loop itself, on its next turn.
    #[default]
    NextTick,
    /// Hand off to the blocking pool so the loop never stalls.
    Defer,
}

impl From<ProducerMode> for Scheduler {
    fn from(mode: ProducerMode) -> Self {
        match mode {
            ProducerMode::NonBlocking => Self::NextTick,
            ProducerMode::Blocking => Self::Defer,
        }
    }
}

/// Handle on the host's event loop.
#[derive(Debug, Clone)]
pub struct EventLoop {
    handle: Handle,
}

impl EventLoop {
    /// Wrap a runtime handle.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running on.
    pub fn current() -> StreamResult<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| StreamError::Configuration(format!("no event loop running: {e}")))
    }

    /// Schedule a future on the loop.
    pub fn next_tick<F>(&self, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Run blocking work off the loop.
    pub fn defer<F>(&self, work: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.spawn_blocking(work)
    }

    /// Run a synchronous job with the given scheduler.
    pub fn schedule<F>(&self, scheduler: Scheduler, job: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        match scheduler {
            Scheduler::NextTick => self.next_tick(async move { job() }),
            Scheduler::Defer => self.defer(job),
        }
    }

    /// Get the runtime handle.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_scheduler_from_mode() {
        assert_eq!(Scheduler::from(ProducerMode::NonBlocking), Scheduler::NextTick);
        assert_eq!(Scheduler::from(ProducerMode::Blocking), Scheduler::Defer);
    }

    #[test]
    fn test_current_without_runtime() {
        assert!(matches!(
            EventLoop::current(),
            Err(StreamError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_next_tick_runs_on_loop_thread() {
        let event_loop = EventLoop::current().unwrap();
        let loop_thread = thread::current().id();

        let (tx, rx) = tokio::sync::oneshot::channel();
        event_loop.schedule(Scheduler::NextTick, move || {
            let _ = tx.send(thread::current().id());
        });

        assert_eq!(rx.await.unwrap(), loop_thread);
    }

    #[tokio::test]
    async fn test_defer_runs_off_loop_thread() {
        let event_loop = EventLoop::current().unwrap();
        let loop_thread = thread::current().id();

        let (tx, rx) = tokio::sync::oneshot::channel();
        event_loop.schedule(Scheduler::Defer, move || {
            let _ = tx.send(thread::current().id());
        });

        assert_ne!(rx.await.unwrap(), loop_thread);
    }
}
