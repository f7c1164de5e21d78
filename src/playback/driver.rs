use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::engine::PlaybackEngine;
use crate::config::SchedulerConfig;
use crate::sink::AudioSink;

/// Calls [`PlaybackEngine::tick`] on a dedicated thread every `period`.
///
/// The engine stays shared behind a mutex so the owner can keep calling
/// `start`, `pause`, `stop` and friends between ticks. Dropping the driver
/// stops the thread and waits for it.
pub struct TickDriver {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TickDriver {
    pub fn spawn<S>(engine: Arc<Mutex<PlaybackEngine<S>>>, period: Duration) -> Self
    where
        S: AudioSink + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let handle = thread::spawn(move || {
            debug!(?period, "tick driver started");
            loop {
                let report = engine.lock().tick();
                if report.ceiling_hit {
                    debug!(steps = report.steps_scheduled, "tick driver is behind");
                }
                // Doubles as the timer: a message or a dropped sender ends the loop.
                match shutdown_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            debug!("tick driver stopped");
        });
        TickDriver {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Tick at the configured scheduler interval.
    pub fn from_config<S>(engine: Arc<Mutex<PlaybackEngine<S>>>, config: &SchedulerConfig) -> Self
    where
        S: AudioSink + Send + 'static,
    {
        Self::spawn(engine, Duration::from_secs_f64(config.tick_interval))
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop ticking and wait for the thread to exit.
    pub fn shutdown(mut self) {
        self.join();
    }

    fn join(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("tick driver thread panicked");
            }
        }
    }
}

impl Drop for TickDriver {
    fn drop(&mut self) {
        self.join();
    }
}
