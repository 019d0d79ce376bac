//! fleet-scheduler — task admission and lifecycle bookkeeping.
//!
//! The scheduler knows nothing about devices or how operations run. It
//! admits tasks into a priority-ordered pending queue and records every
//! lifecycle transition:
//!
//! ```text
//! Pending ──start──▶ Running ──complete──▶ Completed | Failed
//!    │                  │
//!    └──────cancel──────┴──────────────▶ Canceled
//! ```
//!
//! # Architecture
//!
//! ```text
//! TaskScheduler
//!   └── RwLock<Inner>
//!       ├── tasks     (task_id → TaskEntry, every bucket)
//!       ├── pending   (BTreeMap keyed by (Reverse(priority), admission seq))
//!       ├── running   (BTreeMap keyed by start seq)
//!       └── terminal  (VecDeque, oldest first, bounded retention)
//! ```

pub mod error;
pub mod scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::TaskScheduler;
