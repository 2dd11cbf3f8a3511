//! User and profile models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role carried in the token and the user record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Client => "client",
        }
    }
}

/// Account lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Pending,
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Pending => "pending",
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }

    /// Whether an administrator may move an account from `self` to `next`.
    pub fn can_transition_to(self, next: UserStatus) -> bool {
        matches!(
            (self, next),
            (UserStatus::Pending, UserStatus::Active)
                | (UserStatus::Pending, UserStatus::Inactive)
                | (UserStatus::Active, UserStatus::Inactive)
                | (UserStatus::Inactive, UserStatus::Active)
        )
    }
}

/// Contact, business identity and banking details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub email: String,
    pub phone: String,
    pub business_name: String,
    pub legal_name: String,
    pub business_type: String,
    pub website: String,
    pub country: String,
    pub tax_id: String,
    pub bank_name: String,
    pub iban: String,
    pub swift: String,
}

/// A platform account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: Option<String>,
    pub username: String,
    pub role: Role,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default)]
    pub sandbox_mode: bool,
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// The user known from token claims alone, before the profile arrives.
    pub fn minimal(username: impl Into<String>, role: Role) -> Self {
        Self {
            id: None,
            username: username.into(),
            role,
            status: UserStatus::Active,
            sandbox_mode: false,
            profile: Profile::default(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Copy the fields `server` carries; absent ones keep their current value.
    ///
    /// Username and role stay as decoded from the token.
    pub fn merge_from(&mut self, server: &ProfilePayload) {
        if let Some(id) = &server.id {
            self.id = Some(id.clone());
        }
        if let Some(status) = server.status {
            self.status = status;
        }
        if let Some(sandbox_mode) = server.sandbox_mode {
            self.sandbox_mode = sandbox_mode;
        }
        server.profile.apply_to(&mut self.profile);
        self.created_at = server.created_at.or(self.created_at);
        self.updated_at = server.updated_at.or(self.updated_at);
    }
}

/// Partial profile update; only the fields a user may change themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iban: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swift: Option<String>,
}

impl ProfileUpdate {
    /// Overwrite the fields of `profile` that are set here.
    pub fn apply_to(&self, profile: &mut Profile) {
        let fields = [
            (&self.email, &mut profile.email),
            (&self.phone, &mut profile.phone),
            (&self.business_name, &mut profile.business_name),
            (&self.legal_name, &mut profile.legal_name),
            (&self.business_type, &mut profile.business_type),
            (&self.website, &mut profile.website),
            (&self.country, &mut profile.country),
            (&self.tax_id, &mut profile.tax_id),
            (&self.bank_name, &mut profile.bank_name),
            (&self.iban, &mut profile.iban),
            (&self.swift, &mut profile.swift),
        ];
        for (update, current) in fields {
            if let Some(value) = update {
                *current = value.clone();
            }
        }
    }
}

/// The signed-in user as returned by `/profile`. Every field is optional so a
/// partial answer never blanks what the session already knows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<UserStatus>,
    #[serde(default)]
    pub sandbox_mode: Option<bool>,
    #[serde(flatten)]
    pub profile: ProfileUpdate,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request body for creating a new account.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    pub phone: String,
    pub business_name: String,
    pub legal_name: String,
    pub business_type: String,
    pub website: String,
    pub country: String,
    pub tax_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileEnvelope {
    pub user: ProfilePayload,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UsersEnvelope {
    #[serde(default)]
    pub users: Vec<User>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusChange {
    pub status: UserStatus,
}
