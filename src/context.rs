//! Shared handle to a [`LogManager`] and the sinks handed to the host.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::FileLogConfig;
use crate::format::Record;
use crate::lifecycle::LogManager;
use crate::rotation::{RotationOutcome, Stream};
use crate::timestamp::Clock;
use crate::{Error, Result};

/// Cloneable, thread-safe access to one [`LogManager`].
///
/// Build it once at startup and pass it to whatever emits records. All
/// writes, rotation checks and shutdown are serialized through one lock.
#[derive(Clone)]
pub struct LoggingContext {
    manager: Arc<Mutex<LogManager>>,
}

impl LoggingContext {
    /// Create the manager for `config` and warm it up.
    pub fn new(config: &FileLogConfig) -> Result<Self> {
        Self::from_manager(LogManager::new(config)?)
    }

    /// Same as [`new`](Self::new) with a custom clock.
    pub fn with_clock(config: &FileLogConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::from_manager(LogManager::with_clock(config, clock)?)
    }

    /// Warm up `manager` and wrap it.
    pub fn from_manager(manager: LogManager) -> Result<Self> {
        let context = Self::wrap(manager);
        context.start()?;
        Ok(context)
    }

    /// Wrap `manager` without opening its files.
    ///
    /// Writes fail with [`Error::Closed`] until [`start`](Self::start) runs.
    pub fn wrap(manager: LogManager) -> Self {
        Self {
            manager: Arc::new(Mutex::new(manager)),
        }
    }

    /// Open the stream pair and run the startup rotation check, logging a
    /// check that did not complete.
    pub fn start(&self) -> Result<RotationOutcome> {
        let outcome = self.warm_up()?;
        if let RotationOutcome::Aborted(e) = &outcome {
            tracing::warn!("startup rotation check did not complete: {}", e);
        }
        Ok(outcome)
    }

    /// Dispatch `record` by level to both streams.
    pub fn log(&self, record: &Record) -> Result<()> {
        self.lock()?.log(record)
    }

    /// Run a rotation check now.
    pub fn check_rotation(&self) -> Result<RotationOutcome> {
        Ok(self.lock()?.check_rotation())
    }

    /// Re-open the stream pair after a [`shutdown`](Self::shutdown).
    pub fn warm_up(&self) -> Result<RotationOutcome> {
        self.lock()?.warm_up()
    }

    /// Close both handles.
    pub fn shutdown(&self) -> Result<()> {
        self.lock()?.shutdown();
        Ok(())
    }

    /// Sink receiving every record written to the main stream.
    pub fn main_sink(&self) -> LogSink {
        LogSink {
            context: self.clone(),
            stream: Stream::Main,
        }
    }

    /// Sink receiving records written to the error stream.
    pub fn error_sink(&self) -> LogSink {
        LogSink {
            context: self.clone(),
            stream: Stream::Error,
        }
    }

    /// Run [`check_rotation`](Self::check_rotation) every `interval` on a
    /// background thread until the returned guard is dropped.
    pub fn spawn_rotation_checker(&self, interval: Duration) -> Result<RotationChecker> {
        let (stop, stopped) = mpsc::channel::<()>();
        let context = self.clone();
        let handle = std::thread::Builder::new()
            .name("daylog-rotation".to_string())
            .spawn(move || {
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => match context.check_rotation() {
                            Ok(RotationOutcome::Aborted(e)) => {
                                tracing::warn!("scheduled rotation check aborted: {}", e)
                            }
                            Ok(_) => {}
                            Err(e) => {
                                tracing::error!("scheduled rotation check failed: {}", e);
                                break;
                            }
                        },
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;

        Ok(RotationChecker {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, LogManager>> {
        self.manager.lock().map_err(|_| Error::Poisoned)
    }
}

/// One stream as seen by the host's dispatch.
#[derive(Clone)]
pub struct LogSink {
    context: LoggingContext,
    stream: Stream,
}

impl LogSink {
    /// The stream this sink writes to.
    pub fn stream(&self) -> Stream {
        self.stream
    }

    /// Append `record` to the stream, whatever its level.
    pub fn write(&self, record: &Record) -> Result<()> {
        self.context.lock()?.write(self.stream, record)
    }

    /// Close the stream's handle; writes fail until the context warms up again.
    pub fn close(&self) -> Result<()> {
        self.context.lock()?.close_stream(self.stream);
        Ok(())
    }
}

/// Stops the background rotation checker when dropped.
pub struct RotationChecker {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for RotationChecker {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("rotation checker thread panicked");
        }
    }
}
