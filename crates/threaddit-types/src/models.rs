use serde::{Deserialize, Serialize};

/// Role slugs stored in the `roles` table.
///
/// A role row scoped to a subpost grants that role for the subpost only; a row
/// with no subpost applies everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Mod,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Mod => "mod",
        }
    }
}

/// Prefix every subpost name carries in storage and in responses.
pub const SUBPOST_PREFIX: &str = "t/";

/// Stored form of a bare community name, e.g. `rust` -> `t/rust`.
pub fn prefixed_name(name: &str) -> String {
    format!("{SUBPOST_PREFIX}{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_slugs_match_serialized_form() {
        for role in [Role::Admin, Role::Mod] {
            assert_eq!(serde_json::to_value(role).unwrap(), role.as_str());
        }
    }

    #[test]
    fn names_get_the_t_prefix() {
        assert_eq!(prefixed_name("rust"), "t/rust");
    }
}
