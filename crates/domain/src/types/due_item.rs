//! Due items: the three record kinds the dispatcher delivers.
//!
//! Every kind shares the projection `{id, fire_at, destination, text,
//! silent, dedupe_key}`; kind-specific data lives in the variant payload.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_EVENT_TITLE;
use crate::errors::HeraldError;

/// Row identifier of a due item, unique within its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DueItemId(pub i64);

impl fmt::Display for DueItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Routing target for a message (a chat or channel identifier).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Destination(pub i64);

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable key that identifies one delivery in the idempotency ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupeKey(String);

impl DedupeKey {
    /// Wrap a raw key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key used for a one-shot record of the given kind.
    pub fn for_item(kind: ItemKind, id: DueItemId) -> Self {
        Self(format!("{}:{}", kind.as_str(), id.0))
    }

    /// Composite key for a recurring trigger firing: rule identity plus
    /// the scheduled fire time.
    pub fn for_firing(rule_ref: &str, fire_at: DateTime<Utc>) -> Self {
        Self(format!("{rule_ref}@{}", fire_at.timestamp()))
    }

    /// Borrow the raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Discriminant of [`DueItem`], also used to label loops and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Reminder,
    Alarm,
    Trigger,
}

impl ItemKind {
    /// All kinds, in the order their loops are started.
    pub const ALL: [Self; 3] = [Self::Reminder, Self::Alarm, Self::Trigger];

    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reminder => "reminder",
            Self::Alarm => "alarm",
            Self::Trigger => "trigger",
        }
    }

    /// How a delivered item of this kind leaves the due set.
    pub const fn completion(self) -> Completion {
        match self {
            Self::Reminder => Completion::MarkDone,
            Self::Alarm | Self::Trigger => Completion::Delete,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = HeraldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reminder" | "reminders" => Ok(Self::Reminder),
            "alarm" | "alarms" => Ok(Self::Alarm),
            "trigger" | "triggers" => Ok(Self::Trigger),
            other => Err(HeraldError::InvalidInput(format!("unknown item kind: {other}"))),
        }
    }
}

/// Terminal mutation applied after a confirmed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Flip the item's `done` flag.
    MarkDone,
    /// Remove the item row.
    Delete,
}

/// Markup of a message body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFormat {
    /// Sent verbatim; characters like `<` and `&` carry no meaning.
    #[default]
    Plain,
    /// Telegram HTML subset, authored by project trigger rules.
    Html,
}

/// A personal reminder owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: DueItemId,
    pub owner: Destination,
    pub message: String,
    pub remind_at: DateTime<Utc>,
    pub done: bool,
}

/// A calendar alarm attached to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: DueItemId,
    pub owner: Destination,
    pub event_id: i64,
    /// Title of the referenced event, `None` when the event is gone.
    pub event_title: Option<String>,
    pub notify_at: DateTime<Utc>,
}

/// Message rule stored on a project trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRule {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub silent: bool,
}

/// A rule-based project trigger routed to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: DueItemId,
    pub dedupe_key: DedupeKey,
    pub rule: TriggerRule,
    pub channel: Destination,
    pub next_fire_at: DateTime<Utc>,
}

/// Any record the dispatcher can deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DueItem {
    Reminder(Reminder),
    Alarm(Alarm),
    Trigger(Trigger),
}

impl DueItem {
    pub const fn kind(&self) -> ItemKind {
        match self {
            Self::Reminder(_) => ItemKind::Reminder,
            Self::Alarm(_) => ItemKind::Alarm,
            Self::Trigger(_) => ItemKind::Trigger,
        }
    }

    pub const fn id(&self) -> DueItemId {
        match self {
            Self::Reminder(r) => r.id,
            Self::Alarm(a) => a.id,
            Self::Trigger(t) => t.id,
        }
    }

    pub const fn fire_at(&self) -> DateTime<Utc> {
        match self {
            Self::Reminder(r) => r.remind_at,
            Self::Alarm(a) => a.notify_at,
            Self::Trigger(t) => t.next_fire_at,
        }
    }

    pub const fn destination(&self) -> Destination {
        match self {
            Self::Reminder(r) => r.owner,
            Self::Alarm(a) => a.owner,
            Self::Trigger(t) => t.channel,
        }
    }

    /// Message body to hand to the sink.
    pub fn text(&self) -> &str {
        match self {
            Self::Reminder(r) => &r.message,
            Self::Alarm(a) => a.event_title.as_deref().unwrap_or(DEFAULT_EVENT_TITLE),
            Self::Trigger(t) => &t.rule.text,
        }
    }

    /// Reminder text and event titles are user input and go out as plain
    /// text. Trigger rules are authored with markup.
    pub const fn format(&self) -> TextFormat {
        match self {
            Self::Trigger(_) => TextFormat::Html,
            Self::Reminder(_) | Self::Alarm(_) => TextFormat::Plain,
        }
    }

    pub const fn silent(&self) -> bool {
        match self {
            Self::Trigger(t) => t.rule.silent,
            Self::Reminder(_) | Self::Alarm(_) => false,
        }
    }

    /// Only reminders carry a flag; alarms and triggers are pending for as
    /// long as their row exists.
    pub const fn is_done(&self) -> bool {
        match self {
            Self::Reminder(r) => r.done,
            Self::Alarm(_) | Self::Trigger(_) => false,
        }
    }

    pub fn dedupe_key(&self) -> DedupeKey {
        match self {
            Self::Trigger(t) => t.dedupe_key.clone(),
            Self::Reminder(_) | Self::Alarm(_) => DedupeKey::for_item(self.kind(), self.id()),
        }
    }

    /// Due at `now` and not yet completed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.is_done() && self.fire_at() <= now
    }
}
