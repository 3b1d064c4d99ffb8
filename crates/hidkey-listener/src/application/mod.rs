//! Application layer for the listener.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure rules, in `hidkey-core`) and the infrastructure (the OS hook).
//! Code here orchestrates domain objects and depends on the
//! [`HookBackend`](crate::infrastructure::input_capture::HookBackend) trait
//! rather than on Windows directly, so every piece can be driven by the mock
//! backend in tests.
//!
//! # Sub-modules
//!
//! - **`hook_session`** – Owns one installed hook and runs every intercepted
//!   key-down through translation and line buffering.  This runs inside the
//!   system-wide input path, on every keystroke of every application.
//!
//! - **`listener`** – The dedicated worker thread that keeps a session alive,
//!   pumps native messages, and offers idempotent `start`/`stop`.
//!
//! - **`measurement_log`** – Consumer-side history: timestamps, latest value,
//!   and versioned snapshots.  It lives on the consumer's thread and is fed
//!   over a channel, so it needs no locks.

pub mod hook_session;
pub mod listener;
pub mod measurement_log;
