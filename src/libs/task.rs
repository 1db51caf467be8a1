use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Habitica task difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Trivial,
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Priority {
    /// The numeric value Habitica expects in the `priority` field.
    pub fn weight(self) -> f64 {
        match self {
            Priority::Trivial => 0.1,
            Priority::Easy => 1.0,
            Priority::Medium => 1.5,
            Priority::Hard => 2.0,
        }
    }
}

/// A to-do being composed, created or edited.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PendingTask {
    pub name: String,
    /// Days from now until the task is due; `0` means no due date.
    pub days_until_due: u16,
    pub priority: Priority,
    pub notes: String,
    pub tag_ids: BTreeSet<String>,
    /// Assigned by Habitica once the task has been created.
    pub task_id: String,
}

impl PendingTask {
    pub fn new(name: &str, notes: &str, days_until_due: u16, priority: Priority) -> Self {
        Self {
            name: name.to_string(),
            days_until_due,
            priority,
            notes: notes.to_string(),
            tag_ids: BTreeSet::new(),
            task_id: String::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tag_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tag_ids = tag_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_created(&self) -> bool {
        !self.task_id.is_empty()
    }

    /// Due date relative to `now`, or `None` when the task has no deadline.
    pub fn due_date(&self, now: DateTime<Local>) -> Option<DateTime<Local>> {
        match self.days_until_due {
            0 => None,
            days => Some(now + Duration::days(i64::from(days))),
        }
    }
}
