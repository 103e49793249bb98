//! Mattermost REST v4 wire types and the [`Notice`] ↔ attachment mapping.
//!
//! Only the parts of a post Herald writes and reads back are modelled;
//! everything else the server returns is ignored on deserialisation.

use herald_core::notice::{AckControl, Notice, NoticeField, Tone};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const COLOR_WARNING: &str = "#E8A33D";
pub const COLOR_RESOLVED: &str = "#3DB887";
pub const COLOR_ERROR: &str = "#D24B4E";

const ACTION_ID: &str = "acknowledge";
const ACTION_NAME: &str = "Acknowledge";

// ─── Posts ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Post {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub id:         String,
  pub channel_id: String,
  #[serde(default)]
  pub message:    String,
  #[serde(default)]
  pub props:      Props,
  /// Milliseconds since the epoch; non-zero once the post was deleted.
  #[serde(default, skip_serializing)]
  pub delete_at:  i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Props {
  #[serde(default)]
  pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Attachment {
  #[serde(default)]
  pub fallback: String,
  #[serde(default)]
  pub color:    String,
  #[serde(default)]
  pub title:    String,
  #[serde(default)]
  pub text:     String,
  #[serde(default)]
  pub fields:   Vec<Field>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub actions:  Vec<Action>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
  pub title: String,
  /// Mattermost accepts any JSON scalar here.
  #[serde(default)]
  pub value: Value,
  #[serde(default)]
  pub short: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
  #[serde(default)]
  pub id:          String,
  pub name:        String,
  #[serde(rename = "type", default = "button")]
  pub kind:        String,
  #[serde(default)]
  pub style:       String,
  #[serde(default)]
  pub disabled:    bool,
  pub integration: Integration,
}

fn button() -> String { "button".to_owned() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
  pub url:     String,
  #[serde(default)]
  pub context: Value,
}

#[derive(Debug, Deserialize)]
pub struct Channel {
  pub id: String,
}

// ─── Mapping ──────────────────────────────────────────────────────────────────

/// Render `notice` as an attachment whose button calls `action_url`.
pub fn attachment(notice: &Notice, action_url: &str) -> Attachment {
  let color = match notice.tone {
    Tone::Warning => COLOR_WARNING,
    Tone::Resolved => COLOR_RESOLVED,
    Tone::Error => COLOR_ERROR,
  };

  let actions = notice
    .control
    .iter()
    .map(|control| Action {
      id:          ACTION_ID.to_owned(),
      name:        ACTION_NAME.to_owned(),
      kind:        button(),
      style:       "success".to_owned(),
      disabled:    !control.enabled,
      integration: Integration {
        url:     action_url.to_owned(),
        context: serde_json::json!({ "report_id": control.report_id }),
      },
    })
    .collect();

  Attachment {
    fallback: format!("{}: {}", notice.title, notice.text),
    color: color.to_owned(),
    title: notice.title.clone(),
    text: notice.text.clone(),
    fields: notice
      .fields
      .iter()
      .map(|f| Field {
        title: f.title.clone(),
        value: Value::String(f.value.clone()),
        short: true,
      })
      .collect(),
    actions,
  }
}

/// Recover a [`Notice`] from the first attachment of `post`.
///
/// A post that carries no attachment at all, e.g. because someone edited it
/// by hand, reads as a blank notice. The message still exists, so the report
/// stays open and the next sweep renders over it.
pub fn notice(post: &Post) -> Notice {
  let Some(att) = post.props.attachments.first() else {
    return Notice {
      title:   String::new(),
      text:    post.message.clone(),
      tone:    Tone::Warning,
      fields:  Vec::new(),
      control: None,
    };
  };

  let tone = match att.color.to_ascii_uppercase().as_str() {
    COLOR_RESOLVED => Tone::Resolved,
    COLOR_ERROR => Tone::Error,
    _ => Tone::Warning,
  };

  let control = att
    .actions
    .iter()
    .find(|a| a.id == ACTION_ID)
    .and_then(|a| {
      let report_id = a.integration.context.get("report_id")?.as_str()?;
      Some(AckControl {
        report_id: Uuid::parse_str(report_id).ok()?,
        enabled:   !a.disabled,
      })
    });

  Notice {
    title: att.title.clone(),
    text: att.text.clone(),
    tone,
    fields: att
      .fields
      .iter()
      .map(|f| NoticeField { title: f.title.clone(), value: scalar(&f.value) })
      .collect(),
    control,
  }
}

fn scalar(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Null => String::new(),
    other => other.to_string(),
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use herald_core::{
    event::{DomainEvent, EventClass},
    notice::{FIELD_ACKNOWLEDGED_BY, FIELD_REPORTED},
    report::Report,
  };

  use super::*;

  const ACTION_URL: &str = "https://herald.example/actions/acknowledge";

  fn report() -> Report {
    let event = DomainEvent {
      tracked_object_id: "3f1c".into(),
      namespace:         "shop".into(),
      reason:            "BackOff".into(),
      resource:          "Pod/cart-7d9".into(),
      message:           "Back-off restarting failed container".into(),
      occurrence_count:  6,
      class:             EventClass::Warning,
      last_observed_at:  None,
    };
    Report::from_event(&event, Utc::now())
  }

  #[test]
  fn active_report_gets_an_enabled_button_with_its_id() {
    let report = report();
    let att = attachment(&Notice::for_report(&report), ACTION_URL);

    assert_eq!(att.color, COLOR_WARNING);
    assert_eq!(att.actions.len(), 1);
    let action = &att.actions[0];
    assert!(!action.disabled);
    assert_eq!(action.integration.url, ACTION_URL);
    assert_eq!(
      action.integration.context["report_id"],
      Value::String(report.report_id.to_string())
    );
  }

  #[test]
  fn acknowledged_report_disables_the_button() {
    let mut report = report();
    report.acknowledge("alice", Utc::now()).unwrap();
    let att = attachment(&Notice::for_report(&report), ACTION_URL);

    assert_eq!(att.color, COLOR_RESOLVED);
    assert!(att.actions[0].disabled);
    assert!(att.fields.iter().any(|f| f.title == FIELD_ACKNOWLEDGED_BY));
  }

  #[test]
  fn internal_error_has_no_button() {
    let att = attachment(&Notice::internal_error("store unreachable"), ACTION_URL);
    assert_eq!(att.color, COLOR_ERROR);
    assert!(att.actions.is_empty());
    let body = serde_json::to_value(&att).unwrap();
    assert!(body.get("actions").is_none());
  }

  #[test]
  fn rendered_notice_reads_back_unchanged() {
    let mut report = report();
    report.acknowledge("alice", Utc::now()).unwrap();
    let notice = Notice::for_report(&report);

    let post = Post {
      id: "p1".into(),
      channel_id: "c1".into(),
      props: Props { attachments: vec![attachment(&notice, ACTION_URL)] },
      ..Default::default()
    };
    let json = serde_json::to_string(&post).unwrap();
    let back: Post = serde_json::from_str(&json).unwrap();
    assert_eq!(super::notice(&back), notice);
  }

  #[test]
  fn server_response_is_parsed_leniently() {
    // Shape of a real `GET /api/v4/posts/{id}` response, trimmed.
    let body = r##"{
      "id": "9xq7",
      "create_at": 1718000000000,
      "update_at": 1718000000000,
      "edit_at": 0,
      "delete_at": 0,
      "user_id": "bot",
      "channel_id": "c1",
      "message": "",
      "type": "slack_attachment",
      "props": {
        "attachments": [{
          "id": 0,
          "color": "#e8a33d",
          "title": "Warning",
          "text": "An unexpected event occurred in the cluster.",
          "fields": [
            { "title": "Reported", "value": 3, "short": true },
            { "title": "Namespace", "value": "shop", "short": true }
          ],
          "actions": [{
            "id": "acknowledge",
            "name": "Acknowledge",
            "type": "button",
            "disabled": false,
            "integration": {
              "url": "https://herald.example/actions/acknowledge",
              "context": { "report_id": "5b3c1a4e-0f8e-4f43-9a57-1d2b0c6f8e11" }
            }
          }]
        }]
      }
    }"##;

    let post: Post = serde_json::from_str(body).unwrap();
    let notice = notice(&post);
    assert_eq!(notice.tone, Tone::Warning);
    assert_eq!(notice.field(FIELD_REPORTED), Some("3"));
    let control = notice.control.unwrap();
    assert!(control.enabled);
    assert_eq!(control.report_id.to_string(), "5b3c1a4e-0f8e-4f43-9a57-1d2b0c6f8e11");
  }

  #[test]
  fn post_without_attachment_reads_as_a_blank_notice() {
    let post: Post =
      serde_json::from_str(r#"{"id":"p","channel_id":"c","message":"edited by hand"}"#).unwrap();
    let blank = notice(&post);
    assert_eq!(blank.text, "edited by hand");
    assert!(blank.fields.is_empty());
    assert!(blank.control.is_none());

    // It never matches a rendered report, so a sweep puts the report back.
    assert_ne!(blank, Notice::for_report(&report()));
  }

  #[test]
  fn deleted_flag_is_never_sent() {
    let post = Post { channel_id: "c".into(), delete_at: 5, ..Default::default() };
    let body = serde_json::to_value(&post).unwrap();
    assert!(body.get("delete_at").is_none());
    assert!(body.get("id").is_none());
  }
}
