//! Global keyboard hook infrastructure.
//!
//! On Windows, this installs a low-level keyboard hook (`WH_KEYBOARD_LL`) on
//! the listener's dedicated worker thread.  The OS calls the hook procedure
//! synchronously on that same thread, interleaved with the message pump, for
//! every key-down on the machine.
//!
//! # Windows-Specific Implementation
//!
//! The hook callback must complete within ~300ms or Windows silently removes
//! the hook, and while it runs every application's keyboard input is stalled.
//! Handlers therefore only translate, buffer, and hand off.
//!
//! # Testability
//!
//! The [`HookBackend`] trait is the capability seam: `install`, `uninstall`,
//! and `pump_once`.  [`mock::MockHookBackend`] synthesizes key-down events
//! during `pump_once`, exactly where the OS would invoke the real callback,
//! so the worker loop and the line buffering can be tested without an OS hook.

use hidkey_core::KeyEvent;

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

/// Callback invoked for every intercepted key-down.
///
/// Always runs on the thread that called [`HookBackend::install`].
pub type KeyDownHandler = Box<dyn FnMut(KeyEvent) + Send>;

/// Opaque handle to one installed hook.
///
/// Neither `Clone` nor `Copy`: [`HookBackend::uninstall`]
/// consumes it, so a handle can be released at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct HookHandle(usize);

impl HookHandle {
    /// Wraps a raw OS handle value.
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// Returns the raw OS handle value.
    pub fn as_raw(&self) -> usize {
        self.0
    }
}

/// Error type for hook operations.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("failed to register keyboard hook: {0}")]
    RegistrationFailed(String),
    #[error("a keyboard hook is already installed on this thread")]
    AlreadyInstalled,
    #[error("failed to release keyboard hook: {0}")]
    UninstallFailed(String),
    #[error("message pump failed: {0}")]
    PumpFailed(String),
    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),
}

/// Capability interface over the OS keyboard interception point.
///
/// A backend value is cloned and moved onto the worker thread for each
/// listener session; all three methods are then called from that one thread.
pub trait HookBackend: Send {
    /// Registers a system-wide key-down hook delivering events to `handler`.
    ///
    /// # Errors
    ///
    /// [`HookError::RegistrationFailed`] when the OS refuses the hook and
    /// [`HookError::AlreadyInstalled`] when this thread already owns one.
    fn install(&mut self, handler: KeyDownHandler) -> Result<HookHandle, HookError>;

    /// Releases a hook obtained from [`install`](Self::install).
    fn uninstall(&mut self, handle: HookHandle) -> Result<(), HookError>;

    /// Processes all pending native messages without blocking.
    ///
    /// Hook callbacks fire from inside this call.
    fn pump_once(&mut self) -> Result<(), HookError>;
}
