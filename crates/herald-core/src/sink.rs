//! The `NotificationSink` trait, the surface reports are posted to.

use std::future::Future;

use crate::{Result, notice::Notice, report::MessageId};

/// Create, read, and update messages on a notification surface.
///
/// Implementations map transport failures to
/// [`Error::Sink`](crate::Error::Sink) or
/// [`Error::Transient`](crate::Error::Transient).
pub trait NotificationSink: Send + Sync {
  /// Post a new message and return its id.
  fn create<'a>(
    &'a self,
    notice: &'a Notice,
  ) -> impl Future<Output = Result<MessageId>> + Send + 'a;

  /// Fetch a message. `Ok(None)` means the message no longer exists, e.g.
  /// because a human deleted it.
  fn read<'a>(
    &'a self,
    id: &'a MessageId,
  ) -> impl Future<Output = Result<Option<Notice>>> + Send + 'a;

  /// Replace the content of an existing message.
  fn update<'a>(
    &'a self,
    id: &'a MessageId,
    notice: &'a Notice,
  ) -> impl Future<Output = Result<()>> + Send + 'a;
}
