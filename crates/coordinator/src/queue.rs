//! Command queue and transition worker thread
//!
//! A single dedicated thread takes commands off a FIFO queue and runs each
//! flow to completion before taking the next one. This is the only place
//! flows are scheduled, so two physical resets can never race on the same
//! inbox state.

use crate::cancel::CancellationToken;
use crate::engine::TransitionEngine;
use crate::listener::{self, TransitionListener};
use crate::transport::Transport;
use common::{CommandReceiver, CommandSender, TransitionCommand, create_command_channel};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

/// Counters maintained by the worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    completed: AtomicU64,
    dropped: AtomicU64,
}

impl WorkerStats {
    /// Flows currently executing (0 or 1)
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of flows ever executing at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Commands that produced an outcome
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Commands discarded because of cancellation
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Transition worker
///
/// Owns the engine and the receiving end of the command queue.
pub struct TransitionWorker<T: Transport> {
    engine: TransitionEngine<T>,
    listener: Arc<dyn TransitionListener>,
    commands: CommandReceiver,
    cancel: CancellationToken,
    stats: Arc<WorkerStats>,
}

impl<T: Transport> TransitionWorker<T> {
    /// Run until the command queue is closed
    ///
    /// After cancellation, remaining commands are discarded without running.
    pub fn run(self) {
        info!("Transition worker started");

        while let Ok(cmd) = self.commands.recv_command() {
            if self.cancel.is_cancelled() {
                debug!("Discarding command for {} after release", cmd.device());
                self.stats.dropped.fetch_add(1, Ordering::SeqCst);
                continue;
            }
            self.handle_command(cmd);
        }

        info!("Transition worker stopped");
    }

    /// Handle a command, keeping the thread alive if a flow or listener panics
    fn handle_command(&self, cmd: TransitionCommand) {
        self.stats.enter();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.handle_command_inner(cmd)
        }));
        self.stats.exit();

        if let Err(e) = result {
            error!("Panic in transition command handler: {}", panic_message(&*e));
        }
    }

    fn handle_command_inner(&self, cmd: TransitionCommand) {
        let outcome = match &cmd {
            TransitionCommand::ResetDevice { device } => self.engine.handle_device_reset(device),
            TransitionCommand::StartAoap { request } => self.engine.handle_aoap_start(request),
        };

        match outcome {
            Some(outcome) => {
                self.stats.completed.fetch_add(1, Ordering::SeqCst);
                listener::deliver(self.listener.as_ref(), outcome);
            }
            None => {
                debug!("Command for {} dropped by cancellation", cmd.device());
                self.stats.dropped.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Single-worker FIFO command queue
///
/// Commands can be enqueued as soon as the queue exists; they wait until
/// [`CommandQueue::start`] spawns the worker.
pub struct CommandQueue {
    sender: CommandSender,
    receiver: Option<CommandReceiver>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<WorkerStats>,
}

impl CommandQueue {
    pub fn new() -> Self {
        let (sender, receiver) = create_command_channel();
        Self {
            sender,
            receiver: Some(receiver),
            worker: None,
            stats: Arc::new(WorkerStats::default()),
        }
    }

    /// Spawn the worker thread
    pub fn start<T: Transport>(
        &mut self,
        engine: TransitionEngine<T>,
        listener: Arc<dyn TransitionListener>,
        cancel: CancellationToken,
    ) -> common::Result<()> {
        let commands = self
            .receiver
            .take()
            .ok_or_else(|| common::Error::Lifecycle("Worker already started".to_string()))?;

        let worker = TransitionWorker {
            engine,
            listener,
            commands,
            cancel,
            stats: self.stats.clone(),
        };

        let handle = std::thread::Builder::new()
            .name("aoap-worker".to_string())
            .spawn(move || worker.run())?;

        self.worker = Some(handle);
        Ok(())
    }

    /// Enqueue a command without blocking
    ///
    /// Returns false if the queue has been stopped.
    pub fn enqueue(&self, cmd: TransitionCommand) -> bool {
        match self.sender.send(cmd) {
            Ok(()) => true,
            Err(e) => {
                warn!("Command queue closed, dropping command: {}", e);
                false
            }
        }
    }

    /// Close the queue and wait for the worker to exit
    ///
    /// Does not join when called from the worker thread itself (e.g. from a
    /// listener callback); the worker exits on its own once the current
    /// command returns.
    pub fn stop(&mut self) {
        self.sender.close();

        if let Some(handle) = self.worker.take() {
            if handle.thread().id() == std::thread::current().id() {
                debug!("Command queue stopped from the worker thread, not joining");
                return;
            }
            if handle.join().is_err() {
                error!("Transition worker thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        self.stats.clone()
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_track_max_in_flight() {
        let stats = WorkerStats::default();
        stats.enter();
        assert_eq!(stats.in_flight(), 1);
        stats.exit();
        stats.enter();
        stats.exit();

        assert_eq!(stats.in_flight(), 0);
        assert_eq!(stats.max_in_flight(), 1);
    }

    #[test]
    fn test_stopped_queue_refuses_commands() {
        let mut queue = CommandQueue::new();
        queue.stop();

        let accepted = queue.enqueue(TransitionCommand::ResetDevice {
            device: protocol::DeviceInfo::new(1, 1, 0x1234, 0x5678),
        });
        assert!(!accepted);
        assert!(!queue.is_running());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");

        let payload: Box<dyn std::any::Any + Send> = Box::new(7u32);
        assert_eq!(panic_message(&*payload), "non-string panic payload");
    }
}
