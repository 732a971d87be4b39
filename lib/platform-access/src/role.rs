//! Global roles for platform principals.
//!
//! Every principal carries exactly one global role. The role is one of two
//! authority sources consulted by authorization; the other is the
//! per-resource collaborator grant.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Platform-wide role of a principal.
///
/// The platform uses three levels:
/// - `Student`: submits solutions to tasks they can see
/// - `Teacher`: authors tasks and groups and reviews submissions
/// - `Admin`: global override for every resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Learner submitting solutions.
    Student,
    /// Author of tasks and groups.
    Teacher,
    /// Administrator with unrestricted access.
    Admin,
}

impl Role {
    /// Returns true if this role has admin privileges.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Returns true if this role may author groups.
    #[must_use]
    pub fn can_author_groups(&self) -> bool {
        matches!(self, Self::Teacher | Self::Admin)
    }

    /// Returns the storage name of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a stored role name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "teacher" => Ok(Self::Teacher),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_is_admin() {
        assert!(!Role::Student.is_admin());
        assert!(!Role::Teacher.is_admin());
        assert!(Role::Admin.is_admin());
    }

    #[test]
    fn only_teachers_and_admins_author_groups() {
        assert!(!Role::Student.can_author_groups());
        assert!(Role::Teacher.can_author_groups());
        assert!(Role::Admin.can_author_groups());
    }

    #[test]
    fn parse_known_roles() {
        for role in [Role::Student, Role::Teacher, Role::Admin] {
            let parsed: Role = role.as_str().parse().expect("should parse");
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn parse_unknown_role() {
        let err = "superuser".parse::<Role>().unwrap_err();
        assert!(err.to_string().contains("superuser"));
    }

    #[test]
    fn role_serialization_format() {
        let json = serde_json::to_string(&Role::Teacher).expect("serialize");
        assert_eq!(json, "\"teacher\"");

        let parsed: Role = serde_json::from_str("\"student\"").expect("deserialize");
        assert_eq!(parsed, Role::Student);
    }
}
