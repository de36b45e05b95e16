//! # Weft
//!
//! A cooperative, stackful coroutine scheduler for a single logical thread
//! of control. Hosts register coroutine bodies, run them one at a time,
//! suspend one mid-execution and resume it later with its local call-stack
//! state intact, and get its resources reclaimed automatically when it
//! finishes.
//!
//! All coroutines share **one** native stack region. At every suspend
//! point the running coroutine's live stack bytes are copied into its own
//! heap snapshot and copied back, byte-exact, on the next resume. Total
//! memory is one scratch stack plus each coroutine's actual peak usage,
//! not a dedicated stack per coroutine. That is what makes thousands of
//! live coroutines cheap.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                          Scheduler                             │
//! │                                                                │
//! │  ┌────────────┐   ┌──────────────────────────────────────┐    │
//! │  │  Scratch   │   │            Slot Table                │    │
//! │  │   Stack    │   │  [ 0 | 1 | 2 | 3 | ... | cap-1 ]     │    │
//! │  │  (8 MiB)   │   │     │       │                        │    │
//! │  └─────┬──────┘   │     ▼       ▼                        │    │
//! │        │          │  Coroutine Coroutine                 │    │
//! │   runs the        │  ├ task     ├ task                   │    │
//! │   one Running     │  ├ context  ├ context                │    │
//! │   body            │  ├ snapshot ├ snapshot ◄── stack     │    │
//! │                   │  └ status   └ status      bytes      │    │
//! │                   └──────────────────────────────────────┘    │
//! │                                                                │
//! │  resume(id) ──► context switch ──► body ──► pause()/return     │
//! │  sweep(n, life) ──► bounded round-robin expiry scan            │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut sched = weft::open();
//!
//! let id = sched.spawn_fn(|cx| {
//!     let local = 41;
//!     cx.pause();                  // suspend; `local` survives verbatim
//!     assert_eq!(local + 1, 42);
//! }).unwrap();
//!
//! sched.resume(id);                // runs until the pause
//! sched.resume(id);                // finishes; record is reclaimed
//! assert!(!sched.exists(id));
//! ```
//!
//! Scheduling is strictly cooperative: suspension happens only where a
//! body calls [`Yielder::pause`], and timeout expiry only sets an advisory
//! fatal flag plus one forced turn; a coroutine is never unwound from the
//! outside.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod coroutine;
pub mod log;
pub mod scheduler;

mod slots;
mod stack;

// Re-exports
pub use config::{ConfigError, SchedulerConfig, SchedulerConfigBuilder};
pub use coroutine::{CoroutineId, CoroutineStatus, CoroutineTask, SpawnError};
pub use log::LogLevel;
pub use scheduler::{Scheduler, Yielder};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Open a scheduler with the default configuration.
pub fn open() -> Scheduler {
    Scheduler::new(SchedulerConfig::default()).expect("default configuration is always valid")
}

/// Open a scheduler with a custom configuration.
pub fn open_with(config: SchedulerConfig) -> Result<Scheduler, ConfigError> {
    Scheduler::new(config)
}
