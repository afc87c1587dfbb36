use futures_util::future::BoxFuture;

use crate::reading::Reading;

/// Uniform "get value by key" access to a sensor or telemetry backend.
///
/// Implementations must never fail past this boundary: every internal
/// fault is logged and turned into an [`Absence`](crate::Absence).
pub trait DataProvider: Send + Sync {
    /// Short name for log fields.
    fn name(&self) -> &str;

    fn get_value<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Reading>;
}
