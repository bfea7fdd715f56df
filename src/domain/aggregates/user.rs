//! Accounts, roles and credential rules.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::text_enum;
use crate::domain::DomainError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role { #[default] Customer, Admin }
text_enum!(Role, "role", { Customer => "customer", Admin => "admin" });

impl Role {
    pub fn is_admin(&self) -> bool { *self == Self::Admin }

    /// Admin satisfies every requirement; customer only its own.
    pub fn satisfies(&self, required: Role) -> bool {
        match required {
            Role::Customer => true,
            Role::Admin => self.is_admin(),
        }
    }
}

pub fn validate_password(password: &str) -> Result<(), DomainError> {
    let has_letter = password.chars().any(char::is_alphabetic);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if password.chars().count() < 8 || !has_letter || !has_digit {
        return Err(DomainError::WeakPassword);
    }
    Ok(())
}

/// An admin may not remove their own access.
pub fn ensure_not_self_lockout(actor: Uuid, target: Uuid, new_role: Option<Role>, new_active: Option<bool>) -> Result<(), DomainError> {
    let demotes = matches!(new_role, Some(Role::Customer));
    let deactivates = matches!(new_active, Some(false));
    if actor == target && (demotes || deactivates) {
        return Err(DomainError::SelfLockout);
    }
    Ok(())
}
