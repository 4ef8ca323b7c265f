//! Backend implementations for different execution contexts
//!
//! Only local execution is built in. Anything that can start a process and
//! stream its output can implement [`Launcher`](crate::launcher::Launcher) and
//! be wrapped by an [`Executor`](crate::executor::Executor).

pub mod local;
pub use local::LocalLauncher;
