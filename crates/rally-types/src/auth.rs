use crate::id::UserId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Organizer,
    Admin,
}

impl Role {
    pub fn can_review(&self) -> bool {
        matches!(self, Role::Organizer | Role::Admin)
    }
}

/// Authenticated caller as handed over by the session layer. The core never
/// issues or validates sessions itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub role: Role,
}

impl AuthUser {
    pub fn new(id: impl Into<UserId>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}
