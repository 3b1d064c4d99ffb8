//! ListenerThread: the lifecycle controller for the keyboard hook.
//!
//! # Threading model (for beginners)
//!
//! A low-level keyboard hook is bound to the thread that installed it.  The
//! OS only calls the hook procedure while *that* thread pumps its message
//! queue, so the listener owns one dedicated worker thread that:
//!
//! 1. installs the hook (through a [`HookSession`]),
//! 2. reports success or failure back to `start()` over a one-shot channel,
//! 3. alternates between pumping messages and sleeping `poll_interval`,
//! 4. uninstalls the hook once the stop flag is raised or pumping fails.
//!
//! ```text
//!  caller thread                         worker thread "hidkey-hook"
//!  ─────────────                         ───────────────────────────
//!  start() ── spawn ───────────────────▶ HookSession::install
//!          ◀── ready(Ok(session_id)) ───
//!                                        loop { pump_once; sleep }
//!  stop() ── stop flag ────────────────▶ (loop exits)
//!                                        uninstall
//!          ◀── done channel closes ─────
//! ```
//!
//! `start` and `stop` are serialised by one mutex and are both idempotent.
//! Every callback to the [`MeasurementSink`] happens on the worker thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use hidkey_core::{KeyTranslator, Measurement, SessionId, DEFAULT_MAX_LINE_LEN};
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};

use super::hook_session::{HookSession, MeasurementSink};
use crate::infrastructure::input_capture::{HookBackend, HookError};

/// Name given to the worker thread, visible in debuggers and panic messages.
pub const WORKER_THREAD_NAME: &str = "hidkey-hook";

/// Tuning knobs for a [`ListenerThread`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerSettings {
    /// Sleep between message pumps on the worker thread.
    pub poll_interval: Duration,
    /// How long `stop()` waits for the worker to uninstall and exit.
    pub stop_timeout: Duration,
    /// Character cap of the line buffer.
    pub max_line_len: usize,
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            stop_timeout: Duration::from_millis(1000),
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

/// Errors returned by [`ListenerThread::start`] and [`ListenerThread::stop`].
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to install keyboard hook: {0}")]
    HookRegistrationFailed(#[source] HookError),

    #[error("listener thread did not stop within {timeout:?}; the hook may still be installed")]
    HookTeardownTimeout { timeout: Duration },

    #[error("a previous stop timed out; the listener cannot be restarted")]
    Indeterminate,

    #[error("failed to spawn listener thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("listener thread exited before reporting hook status")]
    WorkerLost,
}

/// A running worker thread and the means to stop it.
struct Worker {
    stop: Arc<AtomicBool>,
    /// Disconnects once the worker has uninstalled its hook and returned.
    done: mpsc::Receiver<()>,
    join: JoinHandle<()>,
    session_id: SessionId,
}

impl Worker {
    fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    fn reap(self) {
        let session_id = self.session_id;
        if self.join.join().is_err() {
            error!(session = %session_id, "listener thread panicked");
        }
    }
}

enum WorkerState {
    Idle,
    Running(Worker),
    /// A stop timed out; whether the hook is still installed is unknown.
    Indeterminate,
}

struct Inner<B> {
    backend: B,
    state: WorkerState,
}

/// Owns the hook worker thread and exposes idempotent start/stop.
///
/// # Lifecycle
///
/// ```text
///        start()                     stop()
///  Idle ─────────▶ Running ───────────────────▶ Idle
///   ▲                 │  stop() times out
///   │                 ▼
///   │            Indeterminate  (start() refused)
///   │
///   └── worker exited on its own: reaped by the next start()
/// ```
///
/// The backend is cloned into each new worker, so `B` is typically a small
/// handle (a unit struct on Windows, a shared-state handle in tests).
pub struct ListenerThread<B: HookBackend + Clone + 'static> {
    translator: Arc<dyn KeyTranslator>,
    sink: Arc<dyn MeasurementSink>,
    settings: ListenerSettings,
    inner: Mutex<Inner<B>>,
}

impl<B: HookBackend + Clone + 'static> ListenerThread<B> {
    /// Creates an idle listener.  Nothing is installed until [`start`](Self::start).
    pub fn new<T, S>(backend: B, translator: T, sink: S, settings: ListenerSettings) -> Self
    where
        T: KeyTranslator + 'static,
        S: MeasurementSink + 'static,
    {
        Self {
            translator: Arc::new(translator),
            sink: Arc::new(sink),
            settings,
            inner: Mutex::new(Inner {
                backend,
                state: WorkerState::Idle,
            }),
        }
    }

    /// Creates an idle listener that delivers into a fresh channel.
    pub fn with_channel<T>(
        backend: B,
        translator: T,
        settings: ListenerSettings,
    ) -> (Self, mpsc::Receiver<Measurement>)
    where
        T: KeyTranslator + 'static,
    {
        let (tx, rx) = mpsc::channel();
        (Self::new(backend, translator, tx, settings), rx)
    }

    pub fn settings(&self) -> &ListenerSettings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, Inner<B>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns the worker and blocks until the hook is installed or has failed.
    ///
    /// Calling `start` while already running is a no-op.  A worker that has
    /// exited on its own (pump failure, panic) is reaped and replaced.
    ///
    /// # Errors
    ///
    /// - [`ListenerError::HookRegistrationFailed`] – the OS refused the hook;
    ///   the worker has exited and the listener is idle.
    /// - [`ListenerError::Indeterminate`] – an earlier `stop` timed out.
    /// - [`ListenerError::Spawn`] / [`ListenerError::WorkerLost`] – the worker
    ///   could not be created or died before reporting.
    pub fn start(&self) -> Result<(), ListenerError> {
        let mut inner = self.lock();

        match std::mem::replace(&mut inner.state, WorkerState::Idle) {
            WorkerState::Indeterminate => {
                inner.state = WorkerState::Indeterminate;
                return Err(ListenerError::Indeterminate);
            }
            WorkerState::Running(worker) if !worker.is_finished() => {
                debug!(session = %worker.session_id, "start ignored; listener already running");
                inner.state = WorkerState::Running(worker);
                return Ok(());
            }
            WorkerState::Running(worker) => {
                warn!(session = %worker.session_id, "listener thread had exited; restarting");
                worker.reap();
            }
            WorkerState::Idle => {}
        }

        let worker = self.spawn_worker(inner.backend.clone())?;
        inner.state = WorkerState::Running(worker);
        Ok(())
    }

    /// Signals the worker to uninstall and exit, waiting up to `stop_timeout`.
    ///
    /// Calling `stop` when not running is a no-op.
    ///
    /// # Errors
    ///
    /// [`ListenerError::HookTeardownTimeout`] when the worker does not exit in
    /// time.  The listener then enters an indeterminate state and refuses
    /// further `start` calls.
    pub fn stop(&self) -> Result<(), ListenerError> {
        let mut inner = self.lock();

        let worker = match std::mem::replace(&mut inner.state, WorkerState::Idle) {
            WorkerState::Running(worker) => worker,
            other => {
                inner.state = other;
                return Ok(());
            }
        };

        worker.stop.store(true, Ordering::Release);

        match worker.done.recv_timeout(self.settings.stop_timeout) {
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    session = %worker.session_id,
                    timeout_ms = self.settings.stop_timeout.as_millis() as u64,
                    "listener thread did not stop in time; hook state unknown"
                );
                inner.state = WorkerState::Indeterminate;
                Err(ListenerError::HookTeardownTimeout {
                    timeout: self.settings.stop_timeout,
                })
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let session_id = worker.session_id;
                worker.reap();
                info!(session = %session_id, "listener stopped");
                Ok(())
            }
        }
    }

    /// Returns `true` while a worker holds an installed hook.
    pub fn is_running(&self) -> bool {
        matches!(&self.lock().state, WorkerState::Running(worker) if !worker.is_finished())
    }

    /// Returns `true` after a stop has timed out.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self.lock().state, WorkerState::Indeterminate)
    }

    /// Session id of the running worker, if any.
    pub fn session_id(&self) -> Option<SessionId> {
        match &self.lock().state {
            WorkerState::Running(worker) if !worker.is_finished() => Some(worker.session_id),
            _ => None,
        }
    }

    fn spawn_worker(&self, backend: B) -> Result<Worker, ListenerError> {
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let translator = Arc::clone(&self.translator);
        let sink = Arc::clone(&self.sink);
        let settings = self.settings.clone();
        let worker_stop = Arc::clone(&stop);

        let join = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                run_worker(backend, translator, sink, settings, worker_stop, ready_tx, done_tx)
            })
            .map_err(ListenerError::Spawn)?;

        match ready_rx.recv() {
            Ok(Ok(session_id)) => {
                info!(session = %session_id, "listener started");
                Ok(Worker {
                    stop,
                    done: done_rx,
                    join,
                    session_id,
                })
            }
            Ok(Err(e)) => {
                let _ = join.join();
                error!(error = %e, "keyboard hook registration failed");
                Err(ListenerError::HookRegistrationFailed(e))
            }
            Err(_) => {
                let _ = join.join();
                error!("listener thread exited before reporting hook status");
                Err(ListenerError::WorkerLost)
            }
        }
    }
}

impl<B: HookBackend + Clone + 'static> Drop for ListenerThread<B> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "listener dropped while its thread was still running");
        }
    }
}

/// Body of the worker thread.
///
/// `_done` is dropped after the session, so `stop()` observes completion only
/// once the hook has been uninstalled.  A panic unwinds through the session's
/// `Drop` and therefore also releases the hook.
fn run_worker<B: HookBackend>(
    backend: B,
    translator: Arc<dyn KeyTranslator>,
    sink: Arc<dyn MeasurementSink>,
    settings: ListenerSettings,
    stop: Arc<AtomicBool>,
    ready: mpsc::Sender<Result<SessionId, HookError>>,
    _done: mpsc::Sender<()>,
) {
    let mut session = match HookSession::install(backend, translator, sink, settings.max_line_len)
    {
        Ok(session) => session,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let span = info_span!("hook_worker", session = %session.id());
    let _enter = span.enter();

    if ready.send(Ok(session.id())).is_err() {
        warn!("start() no longer waiting; tearing down hook");
        session.uninstall();
        return;
    }

    while !stop.load(Ordering::Acquire) {
        if let Err(e) = session.pump_once() {
            error!(error = %e, "message pump failed; tearing down hook");
            break;
        }
        thread::sleep(settings.poll_interval);
    }

    session.uninstall();
}

// ── Tests ─────────────────────────────────────────────────────────────────────
