//! Closed role set for the staffing application.

use serde::{Deserialize, Serialize};

/// Application role carried by every session credential.
///
/// Unknown role strings fail at credential decode time, so downstream checks
/// only ever see one of these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Hr,
    Employee,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Hr => "hr",
            Role::Employee => "employee",
            Role::Client => "client",
        }
    }

    /// Allow-list membership. An empty allow-list admits every role.
    pub fn permitted(&self, allowed: &[Role]) -> bool {
        allowed.is_empty() || allowed.contains(self)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "hr" => Ok(Role::Hr),
            "employee" => Ok(Role::Employee),
            "client" => Ok(Role::Client),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_roles() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("HR".parse::<Role>().unwrap(), Role::Hr);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn empty_allow_list_admits_everyone() {
        assert!(Role::Client.permitted(&[]));
        assert!(Role::Admin.permitted(&[]));
    }

    #[test]
    fn allow_list_membership() {
        let allowed = [Role::Admin, Role::Hr];
        assert!(Role::Hr.permitted(&allowed));
        assert!(!Role::Employee.permitted(&allowed));
    }
}
