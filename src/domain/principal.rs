use {super::error::LedgerError, uuid::Uuid};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Owner,
    Admin,
    Member,
}

impl Role {
    /// Unknown or missing roles are treated as plain members.
    pub fn from_profile(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("owner") => Self::Owner,
            Some("admin") => Self::Admin,
            _ => Self::Member,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }
}

/// Authenticated caller of an admin operation.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn require_staff(&self) -> Result<(), LedgerError> {
        match self.role {
            Role::Owner | Role::Admin => Ok(()),
            Role::Member => Err(LedgerError::Forbidden(format!(
                "role `{}` may not perform this operation",
                self.role.as_str()
            ))),
        }
    }
}
