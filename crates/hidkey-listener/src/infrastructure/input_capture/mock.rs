//! Mock hook backend for unit and integration testing.
//!
//! Allows tests to inject synthetic key-down events without requiring a
//! running Windows message loop or OS hooks.  Injected events are queued and
//! delivered from inside [`HookBackend::pump_once`], on the pumping thread,
//! which mirrors how the OS invokes a real low-level hook.
//!
//! Clones share their bookkeeping, so a test keeps one clone for injection
//! and inspection while the listener moves another onto its worker thread.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use hidkey_core::keymap::windows_vk::{us_key_for_char, VK_RETURN, VK_SHIFT};
use hidkey_core::{KeyEvent, KeyboardState};

use super::{HookBackend, HookError, HookHandle, KeyDownHandler};

#[derive(Default)]
struct MockState {
    queue: VecDeque<KeyEvent>,
    next_handle: usize,
    live: HashSet<usize>,
    installs: u32,
    uninstalls: u32,
    install_threads: Vec<ThreadId>,
    pump_threads: HashSet<ThreadId>,
    pumps: u64,
    fail_next_install: Option<String>,
    fail_next_pump: Option<String>,
    panic_next_pump: bool,
    block_next_pump: Option<Duration>,
    pump_blocked: bool,
}

/// A mock implementation of [`HookBackend`] that allows tests to inject events.
pub struct MockHookBackend {
    shared: Arc<Mutex<MockState>>,
    /// The handler installed through *this* clone.
    handler: Option<KeyDownHandler>,
}

impl MockHookBackend {
    /// Creates a new mock backend with no hook installed.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(MockState::default())),
            handler: None,
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panicking pump must not make later inspection panic too.
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a synthetic key-down, as if typed on the hardware.
    pub fn inject_key_down(&self, event: KeyEvent) {
        self.state().queue.push_back(event);
    }

    /// Queues the key-downs a US-layout keyboard produces for `text`.
    ///
    /// `'\n'` is typed as Enter; characters with no US key are skipped.
    /// Returns the number of events queued.
    pub fn type_text(&self, text: &str) -> usize {
        let mut state = self.state();
        let before = state.queue.len();
        for ch in text.chars() {
            let key = if ch == '\n' {
                Some((VK_RETURN, false))
            } else {
                us_key_for_char(ch)
            };
            if let Some((vk, shifted)) = key {
                let keyboard_state = if shifted {
                    KeyboardState::empty().with_down(VK_SHIFT)
                } else {
                    KeyboardState::empty()
                };
                state
                    .queue
                    .push_back(KeyEvent::new(vk as u32, 0, keyboard_state));
            }
        }
        state.queue.len() - before
    }

    /// Number of injected events not yet delivered.
    pub fn pending_events(&self) -> usize {
        self.state().queue.len()
    }

    /// Blocks until every injected event has been delivered or `timeout` passes.
    ///
    /// Returns `true` when the queue drained in time.
    pub fn wait_until_drained(&self, timeout: Duration) -> bool {
        wait_for(timeout, || self.pending_events() == 0)
    }

    /// Blocks until `predicate` holds for this backend or `timeout` passes.
    pub fn wait_until(&self, timeout: Duration, predicate: impl Fn(&Self) -> bool) -> bool {
        wait_for(timeout, || predicate(self))
    }

    /// Makes the next `install` fail with [`HookError::RegistrationFailed`].
    pub fn fail_next_install(&self, reason: impl Into<String>) {
        self.state().fail_next_install = Some(reason.into());
    }

    /// Makes the next `pump_once` fail with [`HookError::PumpFailed`].
    pub fn fail_next_pump(&self, reason: impl Into<String>) {
        self.state().fail_next_pump = Some(reason.into());
    }

    /// Makes the next `pump_once` panic.
    pub fn panic_next_pump(&self) {
        self.state().panic_next_pump = true;
    }

    /// Makes the next `pump_once` sleep for `duration` before returning.
    pub fn block_next_pump(&self, duration: Duration) {
        self.state().block_next_pump = Some(duration);
    }

    /// Returns `true` while a pump is sleeping on a
    /// [`block_next_pump`](Self::block_next_pump) request.
    pub fn is_pump_blocked(&self) -> bool {
        self.state().pump_blocked
    }

    /// Total successful installs across all clones.
    pub fn install_count(&self) -> u32 {
        self.state().installs
    }

    /// Total successful uninstalls across all clones.
    pub fn uninstall_count(&self) -> u32 {
        self.state().uninstalls
    }

    /// Number of hooks currently installed across all clones.
    pub fn live_hooks(&self) -> usize {
        self.state().live.len()
    }

    /// Threads that installed a hook, in order.
    pub fn install_threads(&self) -> Vec<ThreadId> {
        self.state().install_threads.clone()
    }

    /// Threads that have pumped (and therefore run key-down handlers).
    pub fn pump_threads(&self) -> HashSet<ThreadId> {
        self.state().pump_threads.clone()
    }

    /// Number of `pump_once` calls across all clones.
    pub fn pump_count(&self) -> u64 {
        self.state().pumps
    }
}

impl Default for MockHookBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockHookBackend {
    /// Shares bookkeeping; the installed handler is not shared.
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            handler: None,
        }
    }
}

impl HookBackend for MockHookBackend {
    fn install(&mut self, handler: KeyDownHandler) -> Result<HookHandle, HookError> {
        if self.handler.is_some() {
            return Err(HookError::AlreadyInstalled);
        }
        let mut state = self.state();
        if let Some(reason) = state.fail_next_install.take() {
            return Err(HookError::RegistrationFailed(reason));
        }
        state.next_handle += 1;
        let raw = state.next_handle;
        state.live.insert(raw);
        state.installs += 1;
        state.install_threads.push(thread::current().id());
        drop(state);

        self.handler = Some(handler);
        Ok(HookHandle::from_raw(raw))
    }

    fn uninstall(&mut self, handle: HookHandle) -> Result<(), HookError> {
        self.handler = None;
        let mut state = self.state();
        if !state.live.remove(&handle.as_raw()) {
            return Err(HookError::UninstallFailed(format!(
                "unknown hook handle {}",
                handle.as_raw()
            )));
        }
        state.uninstalls += 1;
        Ok(())
    }

    fn pump_once(&mut self) -> Result<(), HookError> {
        let (events, block, failure, panic_now) = {
            let mut state = self.state();
            state.pumps += 1;
            state.pump_threads.insert(thread::current().id());
            let events: Vec<KeyEvent> = if self.handler.is_some() {
                state.queue.drain(..).collect()
            } else {
                Vec::new()
            };
            let block = state.block_next_pump.take();
            state.pump_blocked = block.is_some();
            (
                events,
                block,
                state.fail_next_pump.take(),
                std::mem::take(&mut state.panic_next_pump),
            )
        };

        if let Some(duration) = block {
            thread::sleep(duration);
            self.state().pump_blocked = false;
        }
        if panic_now {
            panic!("mock pump panicked on request");
        }
        if let Some(reason) = failure {
            return Err(HookError::PumpFailed(reason));
        }
        if let Some(handler) = self.handler.as_mut() {
            for event in events {
                handler(event);
            }
        }
        Ok(())
    }
}

fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
}
