//! Details about the authenticated user.

use serde::{Deserialize, Serialize};

/// Attribute bag describing the user behind the current token.
///
/// Always handed out as a value (never absent); the individual fields are
/// optional because the login service may not know all of them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub user_locale: Option<String>,
    pub user_organization: Option<String>,
    pub user_division: Option<String>,
}

impl UserDetail {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.user_locale = Some(locale.into());
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.user_organization = Some(organization.into());
        self
    }

    pub fn with_division(mut self, division: impl Into<String>) -> Self {
        self.user_division = Some(division.into());
        self
    }

    /// True when no attribute is known.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
