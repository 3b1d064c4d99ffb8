//! Integration tests for the listener lifecycle.
//!
//! These tests drive `ListenerThread` end-to-end with the mock hook backend
//! and the US-layout translator: key-downs are injected on the test thread
//! and delivered on the listener's worker thread, exactly where the OS would
//! invoke a real low-level hook.

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use hidkey_core::{Measurement, UsLayoutTranslator};
use hidkey_listener::application::hook_session::CallbackSink;
use hidkey_listener::application::listener::{ListenerError, ListenerSettings, ListenerThread};
use hidkey_listener::infrastructure::input_capture::mock::MockHookBackend;

const WAIT: Duration = Duration::from_secs(2);

// ── Helpers ───────────────────────────────────────────────────────────────────

fn fast_settings() -> ListenerSettings {
    ListenerSettings {
        poll_interval: Duration::from_millis(1),
        stop_timeout: Duration::from_millis(500),
        ..ListenerSettings::default()
    }
}

fn listener_with_channel(
    backend: &MockHookBackend,
    settings: ListenerSettings,
) -> (ListenerThread<MockHookBackend>, mpsc::Receiver<Measurement>) {
    ListenerThread::with_channel(backend.clone(), UsLayoutTranslator::new(), settings)
}

fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn recv_text(rx: &mpsc::Receiver<Measurement>) -> String {
    rx.recv_timeout(WAIT).expect("measurement within timeout").text
}

// ── Measurement flow ──────────────────────────────────────────────────────────

#[test]
fn test_typed_reading_with_crlf_yields_one_measurement() {
    // Arrange
    let backend = MockHookBackend::new();
    let (listener, rx) = listener_with_channel(&backend, fast_settings());
    listener.start().expect("start");

    // Act
    backend.type_text("12.5\r\n");

    // Assert
    assert_eq!(recv_text(&rx), "12.5");
    assert!(backend.wait_until_drained(WAIT));
    listener.stop().expect("stop");
    assert!(rx.try_recv().is_err(), "CR LF must yield exactly one measurement");
}

#[test]
fn test_noise_and_separators_segment_the_stream() {
    let backend = MockHookBackend::new();
    let (listener, rx) = listener_with_channel(&backend, fast_settings());
    listener.start().expect("start");

    backend.type_text("ab+1.5\r\n\r2,3\n-x.y");

    assert_eq!(recv_text(&rx), "1.5");
    assert_eq!(recv_text(&rx), "3");
    assert!(backend.wait_until_drained(WAIT));
    listener.stop().expect("stop");
    assert!(rx.try_recv().is_err(), "unterminated residue is never emitted");
}

#[test]
fn test_measurements_carry_session_and_sequence() {
    let backend = MockHookBackend::new();
    let (listener, rx) = listener_with_channel(&backend, fast_settings());
    listener.start().expect("start");
    let session_id = listener.session_id().expect("running session");

    backend.type_text("1\n2\n");
    let first = rx.recv_timeout(WAIT).expect("first");
    let second = rx.recv_timeout(WAIT).expect("second");

    assert_eq!((first.sequence, second.sequence), (1, 2));
    assert_eq!(first.session_id, session_id);
    assert_eq!(second.session_id, session_id);
}

#[test]
fn test_callbacks_run_on_the_worker_thread() {
    // Arrange
    let backend = MockHookBackend::new();
    let (tx, rx) = mpsc::channel();
    let sink = CallbackSink(move |m: Measurement| {
        let current = thread::current();
        let _ = tx.send((m.text, current.id(), current.name().map(str::to_owned)));
    });
    let listener = ListenerThread::new(
        backend.clone(),
        UsLayoutTranslator::new(),
        sink,
        fast_settings(),
    );
    listener.start().expect("start");

    // Act
    backend.type_text("7\n");
    let (text, callback_thread, name) = rx.recv_timeout(WAIT).expect("callback");

    // Assert
    assert_eq!(text, "7");
    assert_ne!(callback_thread, thread::current().id());
    assert_eq!(backend.install_threads(), vec![callback_thread]);
    assert_eq!(name.as_deref(), Some("hidkey-hook"));
}

// ── Lifecycle ─────────────────────────────────────────────────────────────────

#[test]
fn test_double_start_installs_once() {
    let backend = MockHookBackend::new();
    let (listener, _rx) = listener_with_channel(&backend, fast_settings());

    listener.start().expect("first start");
    let session = listener.session_id();
    listener.start().expect("second start is a no-op");

    assert_eq!(backend.install_count(), 1);
    assert_eq!(backend.live_hooks(), 1);
    assert_eq!(listener.session_id(), session);
}

#[test]
fn test_concurrent_starts_install_once() {
    let backend = MockHookBackend::new();
    let (listener, _rx) = listener_with_channel(&backend, fast_settings());

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| listener.start().expect("start"));
        }
    });

    assert_eq!(backend.install_count(), 1);
    assert!(listener.is_running());
}

#[test]
fn test_restart_discards_residue_and_opens_new_session() {
    // Arrange – "12" is typed but never terminated
    let backend = MockHookBackend::new();
    let (listener, rx) = listener_with_channel(&backend, fast_settings());
    listener.start().expect("start");
    let first_session = listener.session_id().expect("session");
    backend.type_text("12");
    assert!(backend.wait_until_drained(WAIT));

    // Act
    listener.stop().expect("stop");
    listener.start().expect("restart");
    backend.type_text("5\r");

    // Assert
    let m = rx.recv_timeout(WAIT).expect("measurement after restart");
    assert_eq!(m.text, "5");
    assert_eq!(m.sequence, 1);
    assert_ne!(m.session_id, first_session);
    assert_eq!(backend.install_count(), 2);
    assert_eq!(backend.live_hooks(), 1);
}

#[test]
fn test_every_install_is_matched_by_an_uninstall() {
    let backend = MockHookBackend::new();
    let (listener, _rx) = listener_with_channel(&backend, fast_settings());

    for _ in 0..3 {
        listener.start().expect("start");
        listener.stop().expect("stop");
    }

    assert_eq!(backend.install_count(), 3);
    assert_eq!(backend.uninstall_count(), 3);
    assert_eq!(backend.live_hooks(), 0);
    assert!(!listener.is_running());
}

#[test]
fn test_stop_returns_only_after_uninstall() {
    let backend = MockHookBackend::new();
    let (listener, _rx) = listener_with_channel(&backend, fast_settings());
    listener.start().expect("start");

    listener.stop().expect("stop");

    assert_eq!(backend.live_hooks(), 0, "no hook may outlive a successful stop");
}

#[test]
fn test_events_after_stop_produce_nothing() {
    let backend = MockHookBackend::new();
    let (listener, rx) = listener_with_channel(&backend, fast_settings());
    listener.start().expect("start");
    listener.stop().expect("stop");

    backend.type_text("9\n");
    thread::sleep(Duration::from_millis(20));

    assert!(rx.try_recv().is_err());
    assert_eq!(backend.pending_events(), 2, "nobody consumes events without a hook");
}

// ── Failure paths ─────────────────────────────────────────────────────────────

#[test]
fn test_registration_failure_leaves_listener_idle() {
    // Arrange
    let backend = MockHookBackend::new();
    backend.fail_next_install("access denied");
    let (listener, _rx) = listener_with_channel(&backend, fast_settings());

    // Act
    let result = listener.start();

    // Assert
    assert!(matches!(result, Err(ListenerError::HookRegistrationFailed(_))));
    assert!(!listener.is_running());
    assert_eq!(backend.live_hooks(), 0);

    // A later start is unaffected.
    listener.start().expect("start after failure");
    assert!(listener.is_running());
}

#[test]
fn test_stop_timeout_reports_error_and_blocks_restart() {
    // Arrange – the worker gets stuck inside one pump for longer than the timeout
    let backend = MockHookBackend::new();
    let settings = ListenerSettings {
        stop_timeout: Duration::from_millis(50),
        ..fast_settings()
    };
    let (listener, _rx) = listener_with_channel(&backend, settings);
    listener.start().expect("start");
    backend.block_next_pump(Duration::from_millis(400));
    assert!(wait_until(|| backend.is_pump_blocked()));

    // Act
    let started = Instant::now();
    let result = listener.stop();

    // Assert
    assert!(matches!(
        result,
        Err(ListenerError::HookTeardownTimeout { timeout }) if timeout == Duration::from_millis(50)
    ));
    assert!(started.elapsed() < Duration::from_millis(350), "stop must give up at the timeout");
    assert!(listener.is_indeterminate());
    assert!(matches!(listener.start(), Err(ListenerError::Indeterminate)));
    assert!(listener.stop().is_ok(), "stop in the indeterminate state is a no-op");

    // The worker still honours the stop flag once it unblocks.
    assert!(wait_until(|| backend.live_hooks() == 0));
    assert_eq!(backend.uninstall_count(), 1);
}

#[test]
fn test_pump_failure_uninstalls_and_next_start_recovers() {
    // Arrange
    let backend = MockHookBackend::new();
    let (listener, rx) = listener_with_channel(&backend, fast_settings());
    listener.start().expect("start");

    // Act
    backend.fail_next_pump("queue corrupted");

    // Assert – the worker tears down on its own
    assert!(wait_until(|| backend.live_hooks() == 0));
    assert!(wait_until(|| !listener.is_running()));

    listener.start().expect("restart reaps the dead worker");
    backend.type_text("4.2\n");
    assert_eq!(recv_text(&rx), "4.2");
    assert_eq!(backend.install_count(), 2);
}

#[test]
fn test_panicking_pump_still_uninstalls() {
    let backend = MockHookBackend::new();
    let (listener, _rx) = listener_with_channel(&backend, fast_settings());
    listener.start().expect("start");

    backend.panic_next_pump();

    assert!(wait_until(|| backend.live_hooks() == 0));
    assert!(wait_until(|| !listener.is_running()));
    assert_eq!(backend.uninstall_count(), 1);

    listener.start().expect("restart after panic");
    assert_eq!(backend.live_hooks(), 1);
}

#[test]
fn test_dropped_receiver_does_not_disturb_the_worker() {
    let backend = MockHookBackend::new();
    let (listener, rx) = listener_with_channel(&backend, fast_settings());
    listener.start().expect("start");
    drop(rx);

    backend.type_text("1\n2\n");

    assert!(backend.wait_until_drained(WAIT));
    assert!(listener.is_running());
    listener.stop().expect("stop");
}
