use serde::{Deserialize, Serialize};

/// Role carried by a profile's access token
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Staff,
    Admin,
}

impl Role {
    /// Staff and admins may schedule departures and manage bookings
    pub fn can_manage(&self) -> bool {
        matches!(self, Role::Staff | Role::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_names_and_permissions() {
        let role: Role = serde_json::from_str("\"staff\"").unwrap();
        assert_eq!(role, Role::Staff);
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");

        assert!(Role::Admin.can_manage());
        assert!(Role::Staff.can_manage());
        assert!(!Role::Customer.can_manage());
    }
}
