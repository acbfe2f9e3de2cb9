//! Users, roles and the explicit actor passed through every operation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier for users (customers, agents, engineers, leads, ...)
pub type UserId = String;

/// Primary role of a user
///
/// Accepts both the bare name and the `ROLE_`-prefixed form used in
/// bearer-token authority claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[serde(alias = "ROLE_CUSTOMER")]
    Customer,
    #[serde(alias = "ROLE_AGENT")]
    Agent,
    #[serde(alias = "ROLE_TRIAGE_OFFICER")]
    TriageOfficer,
    #[serde(alias = "ROLE_FIELD_ENGINEER")]
    FieldEngineer,
    #[serde(alias = "ROLE_NOC_ENGINEER")]
    NocEngineer,
    #[serde(alias = "ROLE_L1_ENGINEER")]
    L1Engineer,
    #[serde(alias = "ROLE_TEAM_LEAD")]
    TeamLead,
    #[serde(alias = "ROLE_MANAGER")]
    Manager,
    #[serde(alias = "ROLE_CXO")]
    Cxo,
    #[serde(alias = "ROLE_NOC_ADMIN")]
    NocAdmin,
}

impl Role {
    /// Every role, in declaration order
    pub fn all() -> &'static [Role] {
        &[
            Role::Customer,
            Role::Agent,
            Role::TriageOfficer,
            Role::FieldEngineer,
            Role::NocEngineer,
            Role::L1Engineer,
            Role::TeamLead,
            Role::Manager,
            Role::Cxo,
            Role::NocAdmin,
        ]
    }

    /// Engineers are the only roles that can hold tickets
    pub fn is_engineer(self) -> bool {
        matches!(self, Self::FieldEngineer | Self::NocEngineer | Self::L1Engineer)
    }

    /// Roles that raise tickets and own them from the customer side
    pub fn is_requester(self) -> bool {
        matches!(self, Self::Customer | Self::Agent)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "CUSTOMER",
            Self::Agent => "AGENT",
            Self::TriageOfficer => "TRIAGE_OFFICER",
            Self::FieldEngineer => "FIELD_ENGINEER",
            Self::NocEngineer => "NOC_ENGINEER",
            Self::L1Engineer => "L1_ENGINEER",
            Self::TeamLead => "TEAM_LEAD",
            Self::Manager => "MANAGER",
            Self::Cxo => "CXO",
            Self::NocAdmin => "NOC_ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role string is not recognised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role: {}", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let bare = trimmed.strip_prefix("ROLE_").unwrap_or(trimmed);
        Role::all()
            .iter()
            .copied()
            .find(|r| r.as_str().eq_ignore_ascii_case(bare))
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// The caller of a service operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<UserId>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.user_id, self.role)
    }
}

/// A directory user; the role field is the user's single role assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn new(id: impl Into<UserId>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            active: true,
        }
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.id.clone(), self.role)
    }

    /// Active engineer that may receive ticket assignments
    pub fn is_assignable(&self) -> bool {
        self.active && self.role.is_engineer()
    }
}
