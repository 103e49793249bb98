//! `core/v1` `EventList` wire types and their mapping onto [`DomainEvent`].

use chrono::{DateTime, Utc};
use herald_core::event::{DomainEvent, EventClass};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct EventList {
  #[serde(default)]
  pub items:    Vec<Event>,
  #[serde(default)]
  pub metadata: ListMeta,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListMeta {
  /// Opaque token for the next page; absent or empty on the last one.
  #[serde(rename = "continue", default)]
  pub continue_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
  #[serde(default)]
  pub metadata:        ObjectMeta,
  #[serde(default)]
  pub involved_object: ObjectReference,
  #[serde(default)]
  pub reason:          String,
  #[serde(default)]
  pub message:         String,
  pub count:           Option<i64>,
  pub series:          Option<EventSeries>,
  #[serde(rename = "type", default)]
  pub kind:            String,
  pub last_timestamp:  Option<DateTime<Utc>>,
  pub event_time:      Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ObjectMeta {
  #[serde(default)]
  pub uid:       String,
  #[serde(default)]
  pub name:      String,
  #[serde(default)]
  pub namespace: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ObjectReference {
  #[serde(default)]
  pub kind:      String,
  #[serde(default)]
  pub name:      String,
  #[serde(default)]
  pub namespace: String,
}

#[derive(Debug, Deserialize)]
pub struct EventSeries {
  pub count: Option<i64>,
}

impl Event {
  /// Map onto a [`DomainEvent`]. Events without a uid cannot be tracked and
  /// yield `None`.
  pub fn into_domain(self) -> Option<DomainEvent> {
    if self.metadata.uid.is_empty() {
      return None;
    }

    let occurrence_count = [self.count, self.series.and_then(|s| s.count)]
      .into_iter()
      .flatten()
      .find(|n| *n > 0)
      .map_or(1, |n| u32::try_from(n).unwrap_or(u32::MAX));

    let namespace = if self.metadata.namespace.is_empty() {
      self.involved_object.namespace
    } else {
      self.metadata.namespace
    };

    let resource = match (
      self.involved_object.kind.is_empty(),
      self.involved_object.name.is_empty(),
    ) {
      (false, false) => format!("{}/{}", self.involved_object.kind, self.involved_object.name),
      (true, false) => self.involved_object.name,
      _ => self.metadata.name,
    };

    Some(DomainEvent {
      tracked_object_id: self.metadata.uid.into(),
      namespace,
      reason: self.reason,
      resource,
      message: self.message.trim_end().to_owned(),
      occurrence_count,
      class: if self.kind == "Warning" { EventClass::Warning } else { EventClass::Normal },
      last_observed_at: self.last_timestamp.or(self.event_time),
    })
  }
}
