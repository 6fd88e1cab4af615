//! Cooperative Shutdown
//!
//! Background tasks are spawned behind a [`TaskHandle`] that can request a
//! stop and then wait for the task to finish. The [`ShutdownCoordinator`]
//! holds those handles and stops the tasks in order when the process is
//! told to terminate.

pub mod coordinator;
pub mod task;

pub use coordinator::{shutdown_signal, ShutdownCoordinator, ShutdownState};
pub use task::{ShutdownError, StopSignal, TaskHandle};
