// roost: a bounded worker pool
//
// A fixed number of worker threads, each with a single-slot inbox. Submitted
// tasks go to whichever worker reported itself free next. Workers retry failed
// attempts, optionally race each attempt against a deadline, and hand the final
// outcome to pool-wide result/error callbacks.

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pool;
pub mod task;

mod executor;
mod idle;
mod inbox;
mod worker;

pub use config::PoolConfig;
pub use error::{PoolError, TaskError};
pub use metrics::PoolMetrics;
pub use pool::Pool;
pub use task::{Callbacks, Delivery, ErrorCallback, ResultCallback, Task, TaskId};
pub use worker::WorkerStatus;
