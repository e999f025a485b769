//! Default values for the node daemon.

/// The default number of tokio worker threads.
pub(crate) const DEFAULT_THREAD_COUNT: usize = 4;
