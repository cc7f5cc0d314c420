//! User roles and the linkable role types.
//!
//! Role ids mirror the `rol` table: 1 = admin, 2 = worker ("trabajador"),
//! 3 = veterinarian ("veterinario").

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Role id of the administrator role.
pub const ROLE_ID_ADMIN: i32 = 1;
/// Role id of the worker role.
pub const ROLE_ID_WORKER: i32 = 2;
/// Role id of the veterinarian role.
pub const ROLE_ID_VETERINARIAN: i32 = 3;

/// A user's role as stored in the `usuario.id_rol` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    /// Worker role, exposed to clients as "user" for compatibility.
    #[serde(rename = "user")]
    Worker,
    #[serde(rename = "veterinario")]
    Veterinarian,
}

impl UserRole {
    /// Resolve a role from its numeric id. Unknown ids default to `Worker`,
    /// matching the original backend's fallback.
    #[must_use]
    pub fn from_id(id: i32) -> Self {
        match id {
            ROLE_ID_ADMIN => Self::Admin,
            ROLE_ID_VETERINARIAN => Self::Veterinarian,
            _ => Self::Worker,
        }
    }

    /// The numeric id for this role.
    #[must_use]
    pub fn id(self) -> i32 {
        match self {
            Self::Admin => ROLE_ID_ADMIN,
            Self::Worker => ROLE_ID_WORKER,
            Self::Veterinarian => ROLE_ID_VETERINARIAN,
        }
    }

    /// The client-facing role label ("admin", "user", "veterinario").
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Worker => "user",
            Self::Veterinarian => "veterinario",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for UserRole {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" | "trabajador" => Ok(Self::Worker),
            "veterinario" => Ok(Self::Veterinarian),
            other => Err(InvalidRole(other.to_string())),
        }
    }
}

/// Error returned when a role label is not recognized.
#[derive(Debug, Clone, Error)]
#[error("Rol inválido: {0}")]
pub struct InvalidRole(pub String);

/// The two roles an invitation code can attach to a farm.
///
/// Serialized with the Spanish labels used on the wire ("trabajador",
/// "veterinario").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkRole {
    #[serde(rename = "trabajador")]
    Worker,
    #[serde(rename = "veterinario")]
    Veterinarian,
}

impl LinkRole {
    /// The role id a redeeming user must already hold.
    #[must_use]
    pub fn required_role_id(self) -> i32 {
        match self {
            Self::Worker => ROLE_ID_WORKER,
            Self::Veterinarian => ROLE_ID_VETERINARIAN,
        }
    }

    /// Wire label for this link role.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Worker => "trabajador",
            Self::Veterinarian => "veterinario",
        }
    }
}

impl fmt::Display for LinkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LinkRole {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trabajador" => Ok(Self::Worker),
            "veterinario" => Ok(Self::Veterinarian),
            other => Err(InvalidRole(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ids_round_trip() {
        for role in [UserRole::Admin, UserRole::Worker, UserRole::Veterinarian] {
            assert_eq!(UserRole::from_id(role.id()), role);
        }
    }

    #[test]
    fn unknown_role_id_defaults_to_worker() {
        assert_eq!(UserRole::from_id(0), UserRole::Worker);
        assert_eq!(UserRole::from_id(99), UserRole::Worker);
    }

    #[test]
    fn link_role_required_ids() {
        assert_eq!(LinkRole::Worker.required_role_id(), ROLE_ID_WORKER);
        assert_eq!(
            LinkRole::Veterinarian.required_role_id(),
            ROLE_ID_VETERINARIAN
        );
    }

    #[test]
    fn link_role_parses_spanish_labels() {
        assert_eq!("trabajador".parse::<LinkRole>().unwrap(), LinkRole::Worker);
        assert_eq!(
            "veterinario".parse::<LinkRole>().unwrap(),
            LinkRole::Veterinarian
        );
        assert!("propietario".parse::<LinkRole>().is_err());
    }

    #[test]
    fn link_role_serializes_to_wire_label() {
        assert_eq!(
            serde_json::to_string(&LinkRole::Worker).unwrap(),
            "\"trabajador\""
        );
        assert_eq!(
            serde_json::to_string(&LinkRole::Veterinarian).unwrap(),
            "\"veterinario\""
        );
    }
}
