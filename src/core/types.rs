use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Privilege tier of an actor. Tiers are unordered; only access pragmas
/// relate them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    BasicUser,
    AdminUser,
    SuperUser,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::BasicUser, Role::AdminUser, Role::SuperUser];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BasicUser => "BASIC_USER",
            Self::AdminUser => "ADMIN_USER",
            Self::SuperUser => "SUPER_USER",
        }
    }

    /// Article-qualified name used in user-facing messages ("a BASIC_USER").
    pub const fn with_article(&self) -> &'static str {
        match self {
            Self::BasicUser => "A BASIC_USER",
            Self::AdminUser => "An ADMIN_USER",
            Self::SuperUser => "A SUPER_USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BASIC_USER" => Ok(Self::BasicUser),
            "ADMIN_USER" => Ok(Self::AdminUser),
            "SUPER_USER" => Ok(Self::SuperUser),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// The already-authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

impl Actor {
    pub const fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_wire_name() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
            assert_eq!(
                serde_json::to_value(role).unwrap(),
                serde_json::Value::String(role.to_string())
            );
        }
        assert!("OWNER".parse::<Role>().is_err());
    }
}
