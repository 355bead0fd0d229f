use crate::error::DriverError;
use crate::record::Record;
use async_trait::async_trait;

/// Delivery backend for normalized [`Record`]s.
///
/// Implementations own at most one lazily created connection, released by
/// [`Driver::close`]. Calls take `&mut self`: a driver is used from one
/// task at a time, and sharing one across threads is only as safe as the
/// wrapping the caller puts around it.
#[async_trait]
pub trait Driver: Send {
    /// Deliver a single record and wait until the backend acknowledges it.
    ///
    /// **Returns**
    /// - `Ok(id)` with the backend-assigned delivery identifier (row id,
    ///   message id, or a fixed sentinel for backends without one).
    /// - `Err(..)` for connection, delivery or integrity failures. Nothing
    ///   is retried.
    async fn send(&mut self, record: &Record) -> Result<String, DriverError>;

    /// Release any backend handle. Safe to call more than once.
    async fn close(&mut self);
}

#[async_trait]
impl<D: Driver + ?Sized> Driver for Box<D> {
    async fn send(&mut self, record: &Record) -> Result<String, DriverError> {
        (**self).send(record).await
    }

    async fn close(&mut self) {
        (**self).close().await
    }
}
