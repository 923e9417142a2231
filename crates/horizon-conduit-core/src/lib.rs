//! Core systems for Horizon Conduit.
//!
//! This crate provides the three primitives every transport object in
//! `horizon-conduit-net` is built from:
//!
//! - [`Signal`] — a type-safe observer registry for event delivery. Transport
//!   objects expose their events as public `Signal` fields; consumers attach
//!   zero or more slots and every slot is invoked for every emission.
//! - [`Lifecycle`] — the two-state (active/disposed) lifecycle shared by all
//!   transport objects, with a fail-fast guard for post-disposal access.
//! - [`RecurrentTask`] — a cooperative repeating-step task: run an async step
//!   to completion, sleep a fixed tick, repeat until cancelled. Send loops,
//!   receive loops and accept loops all use this one concurrency unit.
//!
//! # Logging
//!
//! Horizon Conduit is instrumented with the `tracing` crate. The library
//! never installs a subscriber; applications that want logs should do so
//! themselves:
//!
//! ```ignore
//! tracing_subscriber::fmt::init();
//! ```

mod lifecycle;
mod signal;
mod task;

pub use lifecycle::{DisposedError, Lifecycle, LifecycleState};
pub use signal::{Signal, SlotGuard, SlotId};
pub use task::{RecurrentTask, StepControl, DEFAULT_TICK_INTERVAL};
