//! Small helpers shared across modules.

use std::fmt::Debug;

pub trait ResultExt<T> {
    /// Log the error with the given context and turn the result into an
    /// `Option`, for operations that are best-effort by design.
    fn log_error(self, context: &str) -> Option<T>;
}

impl<T, E: Debug> ResultExt<T> for Result<T, E> {
    fn log_error(self, context: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                log::error!("{context}: {e:?}");
                None
            }
        }
    }
}
