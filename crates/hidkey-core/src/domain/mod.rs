//! Domain entities for the HidKey listener.
//!
//! This module contains pure logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! The innermost layer of the code base is the **domain**.  Domain code has
//! no imports from OS APIs, threads, or hook machinery, and can be tested on
//! any platform without setup.  The listener thread and the Windows hook live
//! in outer layers and depend on these types, never the other way round.

/// Intercepted key-down events and keyboard state snapshots.
pub mod key_event;

/// The measurement line buffer: the core parsing state machine.
///
/// See [`line_buffer::LineBuffer`] for the main type.
pub mod line_buffer;

/// Completed measurements handed to consumers.
pub mod measurement;
