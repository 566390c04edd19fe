//! Entities stored in the database, request payloads and response views.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::{AppError, Result};

pub const NAME_MAX_LEN: usize = 100;
pub const DEFAULT_PAGE_LIMIT: i64 = 100;

// ─────────────────────────────────────────────────────────
// Entities
// ─────────────────────────────────────────────────────────

/// A fundraising project defined by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CharityProject {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub full_amount: i64,
    pub invested_amount: i64,
    pub fully_invested: bool,
    pub create_date: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_date: Option<NaiveDateTime>,
}

/// A user's donation. Serialises as the full (superuser) view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Donation {
    pub id: i64,
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub full_amount: i64,
    pub invested_amount: i64,
    pub fully_invested: bool,
    pub create_date: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub is_superuser: bool,
    pub created_at: NaiveDateTime,
}

// ─────────────────────────────────────────────────────────
// Response views
// ─────────────────────────────────────────────────────────

/// What a donor sees about their own donation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DonationShort {
    pub id: i64,
    pub full_amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub create_date: NaiveDateTime,
}

impl From<Donation> for DonationShort {
    fn from(d: Donation) -> Self {
        DonationShort {
            id: d.id,
            full_amount: d.full_amount,
            comment: d.comment,
            create_date: d.create_date,
        }
    }
}

/// Returned once, on registration; the only place the token is exposed.
#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub id: i64,
    pub email: String,
    pub is_superuser: bool,
    pub token: String,
}

impl From<User> for RegisteredUser {
    fn from(u: User) -> Self {
        RegisteredUser {
            id: u.id,
            email: u.email,
            is_superuser: u.is_superuser,
            token: u.token,
        }
    }
}

// ─────────────────────────────────────────────────────────
// Request payloads
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectCreate {
    pub name: String,
    pub description: String,
    pub full_amount: i64,
}

impl ProjectCreate {
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_description(&self.description)?;
        validate_amount(self.full_amount)
    }
}

/// Partial update. Absent fields are left alone; explicit `null` is rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectUpdate {
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub full_amount: Option<Option<i64>>,
}

impl ProjectUpdate {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            validate_name(name.as_deref().ok_or_else(|| null_field("name"))?)?;
        }
        if let Some(description) = &self.description {
            validate_description(
                description
                    .as_deref()
                    .ok_or_else(|| null_field("description"))?,
            )?;
        }
        if let Some(amount) = self.full_amount {
            validate_amount(amount.ok_or_else(|| null_field("full_amount"))?)?;
        }
        Ok(())
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_ref().and_then(|n| n.as_deref())
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_ref().and_then(|d| d.as_deref())
    }

    pub fn full_amount(&self) -> Option<i64> {
        self.full_amount.flatten()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DonationCreate {
    pub full_amount: i64,
    pub comment: Option<String>,
}

impl DonationCreate {
    pub fn validate(&self) -> Result<()> {
        validate_amount(self.full_amount)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserCreate {
    pub email: String,
}

impl UserCreate {
    pub fn validate(&self) -> Result<()> {
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
            _ => Err(AppError::Validation(format!(
                "`{email}` is not a valid e-mail address"
            ))),
        }
    }
}

/// `?skip=&limit=` query for list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    /// Resolve to `(skip, limit)`, applying defaults and bounds.
    pub fn resolve(&self) -> Result<(i64, i64)> {
        let skip = self.skip.unwrap_or(0);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if skip < 0 {
            return Err(AppError::Validation("`skip` must not be negative".into()));
        }
        if !(1..=DEFAULT_PAGE_LIMIT).contains(&limit) {
            return Err(AppError::Validation(format!(
                "`limit` must be between 1 and {DEFAULT_PAGE_LIMIT}"
            )));
        }
        Ok((skip, limit))
    }
}

// ─────────────────────────────────────────────────────────
// Validation helpers
// ─────────────────────────────────────────────────────────

/// Maps a present field to `Some(value)` so that `null` shows up as `Some(None)`.
fn present<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn null_field(field: &str) -> AppError {
    AppError::Validation(format!("Field `{field}` cannot be empty"))
}

fn validate_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    if len == 0 || len > NAME_MAX_LEN {
        return Err(AppError::Validation(format!(
            "Project name must be between 1 and {NAME_MAX_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<()> {
    if description.is_empty() {
        return Err(AppError::Validation(
            "Project description must not be empty".into(),
        ));
    }
    Ok(())
}

fn validate_amount(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(AppError::Validation(
            "`full_amount` must be a positive integer".into(),
        ));
    }
    Ok(())
}
