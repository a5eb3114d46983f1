use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::pagination::{Record, SortKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub full_name: Option<String>,
    pub dob: Option<NaiveDate>,
    /// Comma separated role names.
    pub roles: String,
    pub gender: Option<String>,
    pub phone_number: Option<String>,
    pub phone_verified_at: Option<DateTime<Utc>>,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub profile_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: UserRole) -> bool {
        self.roles
            .split(',')
            .any(|r| r.trim().eq_ignore_ascii_case(role.as_str()))
    }
}

impl Record for User {
    fn id(&self) -> Uuid {
        self.id
    }

    fn text(&self, column: &str) -> Option<&str> {
        match column {
            "email" => Some(&self.email),
            "full_name" => self.full_name.as_deref(),
            "phone_number" => self.phone_number.as_deref(),
            _ => None,
        }
    }

    fn sort_key(&self, column: &str) -> SortKey {
        match column {
            "email" => SortKey::Text(self.email.clone()),
            "full_name" => self
                .full_name
                .clone()
                .map(SortKey::Text)
                .unwrap_or(SortKey::Null),
            _ => SortKey::Time(self.created_at),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub dob: Option<NaiveDate>,
    pub roles: String,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub full_name: Option<Option<String>>,
    pub dob: Option<Option<NaiveDate>>,
    pub gender: Option<Option<String>>,
    pub phone_number: Option<Option<String>>,
    pub phone_verified_at: Option<Option<DateTime<Utc>>>,
    pub email_verified_at: Option<Option<DateTime<Utc>>>,
    pub profile_id: Option<Option<Uuid>>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, user: &mut User) {
        if let Some(v) = &self.full_name {
            user.full_name = v.clone();
        }
        if let Some(v) = self.dob {
            user.dob = v;
        }
        if let Some(v) = &self.gender {
            user.gender = v.clone();
        }
        if let Some(v) = &self.phone_number {
            user.phone_number = v.clone();
        }
        if let Some(v) = self.phone_verified_at {
            user.phone_verified_at = v;
        }
        if let Some(v) = self.email_verified_at {
            user.email_verified_at = v;
        }
        if let Some(v) = self.profile_id {
            user.profile_id = v;
        }
    }
}
