//! Notice: the transport-neutral rendering of a report.
//!
//! Sinks translate a [`Notice`] into whatever their surface understands (a
//! Mattermost attachment, a plain-text message, ...) and, on read, translate
//! it back as faithfully as the surface allows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::report::{LifecycleState, Report};

pub const FIELD_NAMESPACE: &str = "Namespace";
pub const FIELD_REASON: &str = "Reason";
pub const FIELD_OBJECT: &str = "Object";
pub const FIELD_MESSAGE: &str = "Message";
pub const FIELD_OCCURRENCES: &str = "Occurrences";
pub const FIELD_REPORTED: &str = "Reported";
pub const FIELD_ACKNOWLEDGED_BY: &str = "Acknowledged by";
pub const FIELD_ACKNOWLEDGED_AT: &str = "Acknowledged at";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Visual weight of a notice; sinks map it to a colour or an icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
  Warning,
  Resolved,
  Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeField {
  pub title: String,
  pub value: String,
}

/// The button a human presses to take ownership of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckControl {
  pub report_id: Uuid,
  pub enabled:   bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
  pub title:   String,
  pub text:    String,
  pub tone:    Tone,
  pub fields:  Vec<NoticeField>,
  pub control: Option<AckControl>,
}

impl Notice {
  /// Render the current state of `report`.
  pub fn for_report(report: &Report) -> Self {
    let mut fields = vec![
      field(FIELD_NAMESPACE, &report.namespace),
      field(FIELD_REASON, &report.reason),
      field(FIELD_OBJECT, &report.resource),
      field(FIELD_MESSAGE, &report.message),
      field(FIELD_OCCURRENCES, report.occurrence_count),
      field(FIELD_REPORTED, report.report_times),
    ];

    let acknowledged = report.state == LifecycleState::Acknowledged;
    if acknowledged {
      if let Some(by) = &report.acknowledged_by {
        fields.push(field(FIELD_ACKNOWLEDGED_BY, by));
      }
      if let Some(at) = report.acknowledged_at {
        fields.push(field(FIELD_ACKNOWLEDGED_AT, format_timestamp(at)));
      }
    }

    Self {
      title: "Warning".to_owned(),
      text: "An unexpected event occurred in the cluster.".to_owned(),
      tone: if acknowledged { Tone::Resolved } else { Tone::Warning },
      fields,
      control: Some(AckControl {
        report_id: report.report_id,
        enabled:   report.state == LifecycleState::Active,
      }),
    }
  }

  /// A one-off message about a failure inside Herald itself.
  pub fn internal_error(detail: &str) -> Self {
    Self {
      title:   "Internal error".to_owned(),
      text:    detail.to_owned(),
      tone:    Tone::Error,
      fields:  Vec::new(),
      control: None,
    }
  }

  /// Value of the first field titled `title`.
  pub fn field(&self, title: &str) -> Option<&str> {
    self
      .fields
      .iter()
      .find(|f| f.title == title)
      .map(|f| f.value.as_str())
  }

  pub fn acknowledged_by(&self) -> Option<&str> { self.field(FIELD_ACKNOWLEDGED_BY) }
}

fn field(title: &str, value: impl ToString) -> NoticeField {
  NoticeField { title: title.to_owned(), value: value.to_string() }
}

fn format_timestamp(at: DateTime<Utc>) -> String { at.format(TIMESTAMP_FORMAT).to_string() }
