//! User-medication link model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Links a user to a medication with an activity window.
///
/// Only active, currently-in-window entries are in scope for pairwise
/// checking. This subsystem consumes them read-only; ownership of the
/// set lives with the medication-management collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserMedication {
    pub id: String,
    pub user_id: String,
    pub medication_id: String,
    pub active: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

impl UserMedication {
    /// Create a new active user-medication starting now, with no end date.
    pub fn new(user_id: impl Into<String>, medication_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            medication_id: medication_id.into(),
            active: true,
            start_date: Utc::now(),
            end_date: None,
        }
    }

    /// Whether this entry is active and `now` falls inside its date window.
    pub fn is_in_window(&self, now: DateTime<Utc>) -> bool {
        if !self.active || self.start_date > now {
            return false;
        }
        match self.end_date {
            Some(end) => end >= now,
            None => true,
        }
    }
}
