//! HookSession: one installed keyboard hook and its keystroke pipeline.
//!
//! A session registers a key-down handler with a [`HookBackend`].  For each
//! intercepted key-down the handler translates the key, feeds the character
//! into a [`LineBuffer`], and hands every completed line to a
//! [`MeasurementSink`].
//!
//! # Invariants
//!
//! - A session holds exactly one live hook handle from `install` until
//!   `uninstall`.
//! - `uninstall` is idempotent and also runs from `Drop`, so the hook is
//!   released on every exit path of the owning thread, including unwinding.
//! - Per-event failures (no character, panicking sink) are absorbed here and
//!   never reach the backend, which must always chain the event onward.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;

use hidkey_core::{
    FeedOutcome, KeyEvent, KeyTranslator, LineBuffer, Measurement, SessionId,
};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::infrastructure::input_capture::{HookBackend, HookError, HookHandle};

/// Receives completed measurements.
///
/// `deliver` is called on the listener's worker thread, inside the global
/// input delivery path: implementations must hand off and return quickly.
pub trait MeasurementSink: Send + Sync {
    fn deliver(&self, measurement: Measurement);
}

impl MeasurementSink for mpsc::Sender<Measurement> {
    fn deliver(&self, measurement: Measurement) {
        if self.send(measurement).is_err() {
            debug!("measurement receiver dropped; reading discarded");
        }
    }
}

impl<T: MeasurementSink + ?Sized> MeasurementSink for Arc<T> {
    fn deliver(&self, measurement: Measurement) {
        (**self).deliver(measurement)
    }
}

/// Adapts a closure into a [`MeasurementSink`].
pub struct CallbackSink<F>(pub F);

impl<F> MeasurementSink for CallbackSink<F>
where
    F: Fn(Measurement) + Send + Sync,
{
    fn deliver(&self, measurement: Measurement) {
        (self.0)(measurement)
    }
}

/// Translation → line buffering → delivery for one session.
///
/// Owned by the key-down handler, so it is only ever touched from the thread
/// the hook was installed on.
pub struct KeyDownPipeline {
    session_id: SessionId,
    translator: Arc<dyn KeyTranslator>,
    buffer: LineBuffer,
    sink: Arc<dyn MeasurementSink>,
    sequence: u64,
}

impl KeyDownPipeline {
    pub fn new(
        session_id: SessionId,
        translator: Arc<dyn KeyTranslator>,
        sink: Arc<dyn MeasurementSink>,
        max_line_len: usize,
    ) -> Self {
        Self {
            session_id,
            translator,
            buffer: LineBuffer::with_max_len(max_line_len),
            sink,
            sequence: 0,
        }
    }

    /// Processes one intercepted key-down.  Never panics.
    pub fn on_key_down(&mut self, event: KeyEvent) {
        let vk_code = event.vk_code;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.process(event)));
        if outcome.is_err() {
            warn!(vk_code, "key-down processing panicked; event ignored");
        }
    }

    /// Characters accepted since the last terminator or reset.
    pub fn pending(&self) -> &str {
        self.buffer.pending()
    }

    /// Number of measurements emitted so far.
    pub fn emitted(&self) -> u64 {
        self.sequence
    }

    fn process(&mut self, event: KeyEvent) {
        let Some(ch) = self.translator.translate_event(&event) else {
            trace!(vk_code = event.vk_code, "key produced no character");
            return;
        };

        match self.buffer.push(ch) {
            FeedOutcome::Completed(text) => {
                self.sequence += 1;
                let measurement = Measurement::new(text, self.sequence, self.session_id);
                debug!(
                    sequence = measurement.sequence,
                    value = %measurement.text,
                    "measurement completed"
                );
                self.sink.deliver(measurement);
            }
            FeedOutcome::Reset { discarded } if discarded > 0 => {
                trace!(discarded, "unexpected character; partial token discarded");
            }
            FeedOutcome::Overflow { discarded } => {
                warn!(
                    discarded,
                    max_len = self.buffer.max_len(),
                    "no terminator within line cap; pending token dropped"
                );
            }
            _ => {}
        }
    }
}

/// Owns one installed hook for its whole life.
pub struct HookSession<B: HookBackend> {
    id: SessionId,
    backend: B,
    handle: Option<HookHandle>,
}

impl<B: HookBackend> HookSession<B> {
    /// Installs a hook on the calling thread.
    ///
    /// Key-down callbacks will run on this thread while it calls
    /// [`pump_once`](Self::pump_once).
    ///
    /// # Errors
    ///
    /// Propagates [`HookError::RegistrationFailed`] (or `AlreadyInstalled`)
    /// from the backend; nothing is left installed in that case.
    pub fn install(
        mut backend: B,
        translator: Arc<dyn KeyTranslator>,
        sink: Arc<dyn MeasurementSink>,
        max_line_len: usize,
    ) -> Result<Self, HookError> {
        let id = Uuid::new_v4();
        let mut pipeline = KeyDownPipeline::new(id, translator, sink, max_line_len);
        let handle = backend.install(Box::new(move |event| pipeline.on_key_down(event)))?;
        info!(session = %id, "keyboard hook installed");
        Ok(Self {
            id,
            backend,
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn is_installed(&self) -> bool {
        self.handle.is_some()
    }

    /// Pumps pending native messages; key-down callbacks fire from here.
    pub fn pump_once(&mut self) -> Result<(), HookError> {
        self.backend.pump_once()
    }

    /// Releases the hook.  Calling it again is a no-op.
    pub fn uninstall(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        match self.backend.uninstall(handle) {
            Ok(()) => info!(session = %self.id, "keyboard hook uninstalled"),
            Err(e) => warn!(session = %self.id, error = %e, "keyboard hook release failed"),
        }
    }
}

impl<B: HookBackend> Drop for HookSession<B> {
    fn drop(&mut self) {
        self.uninstall();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
