//! Tag-fair job scheduling and cooperative actors for plain OS threads.
//!
//! The crate offers four tightly related pieces:
//!
//! - [`FairQueue`]: a single-owner FIFO whose tags are served round-robin,
//!   so no tag can starve another. All operations are O(1).
//! - [`Future`]: a one-shot cell carrying a value or an error, with blocking
//!   waiters and timed waits.
//! - [`FairPool`]: a resizable worker pool pulling jobs from a shared
//!   `FairQueue<Job>` under one mutex and condition variable.
//! - [`Actor`]: a message-driven entity that either block-receives or
//!   reacts cooperatively, multiplexing many logical message loops onto a
//!   small number of threads via a pluggable [`Scheduler`].
//!
//! ```
//! use std::sync::Arc;
//! use fairpool::FairPool;
//!
//! let pool = Arc::new(FairPool::new(2)?);
//! let answer = pool.submit_future(0, || Ok(6 * 7));
//! assert_eq!(answer.get_value()?, 42);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod actor;
pub mod config;
pub mod error;
pub mod future;
pub mod logging;
pub mod pool;
pub mod queue;
pub mod scheduler;

// Re-export key types for easier usage
pub use actor::{Actor, ActorRef};
pub use config::FairPoolConfig;
pub use error::{ActorError, FutureError, PoolError, QueueError};
pub use future::{Future, Waitable};
pub use pool::{FairPool, Job};
pub use queue::{FairQueue, Tag};
pub use scheduler::{Scheduler, SpawnScheduler};
