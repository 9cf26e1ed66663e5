//! Team member domain model.

use super::{require_non_negative, require_text, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Stable identifier for a user.
pub type UserId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Coordinator,
    Member,
    Authority,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Coordinator => "coordinator",
            Self::Member => "member",
            Self::Authority => "authority",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "coordinator" => Some(Self::Coordinator),
            "member" => Some(Self::Member),
            "authority" => Some(Self::Authority),
            _ => None,
        }
    }
}

/// Team member record. Email is the natural key used by sync resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub active: bool,
    pub hourly_cost: Option<f64>,
    pub specialties: BTreeSet<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    /// Creates an active member. The email is stored lowercased.
    pub fn new(name: impl Into<String>, email: &str, role: UserRole, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: normalize_email(email),
            role,
            active: true,
            hourly_cost: None,
            specialties: BTreeSet::new(),
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("user name", &self.name)?;
        if !EMAIL_RE.is_match(&self.email) {
            return Err(ValidationError::InvalidEmail(self.email.clone()));
        }
        require_non_negative("hourly cost", self.hourly_cost)
    }

    pub fn touch(&mut self, now_ms: i64) {
        self.updated_at = self.updated_at.max(now_ms);
    }
}

/// Canonical email form used for storage and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}
