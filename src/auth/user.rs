//! Authenticated principal and transient credential types.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::ToSchema;

/// Super-administrator role.
pub const ROLE_ADMIN: &str = "admin";

/// Wildcard granting every permission.
pub const ALL_PERMISSIONS: &str = "*:*:*";

/// Account status value for enabled accounts.
pub const STATUS_ENABLED: i32 = 1;

/// Password-free, in-memory representation of an authenticated principal.
///
/// Built fresh on every successful login or per-request identity
/// resolution and never mutated afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginUser {
    /// Numeric id when issued by the system of record; `None` for OIDC
    /// subjects that are not numeric.
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<i32>,
    pub dept_id: Option<i64>,
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub roles: HashSet<String>,
    #[serde(default)]
    pub permissions: HashSet<String>,
    /// Token the session was issued under, absent until login completes.
    pub token: Option<String>,
}

impl LoginUser {
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Permission membership; the admin wildcard grants everything.
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission) || self.permissions.contains(ALL_PERMISSIONS)
    }
}

/// Credentials fetched from the system of record for local verification.
///
/// Exists only for the duration of a login attempt. Deliberately not
/// `Serialize`: the hash must never be written to a shared cache, a log
/// line, or a response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub user_id: i64,
    pub username: String,
    pub nickname: Option<String>,
    /// Argon2 PHC string; `SecretString` keeps it out of debug output.
    pub password_hash: SecretString,
    pub status: Option<i32>,
    pub dept_id: Option<i64>,
    #[serde(default)]
    pub roles: HashSet<String>,
    #[serde(default)]
    pub permissions: HashSet<String>,
}

impl Credentials {
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.status.map_or(true, |status| status == STATUS_ENABLED)
    }

    /// Build the password-free principal for a verified login.
    #[must_use]
    pub fn into_login_user(self) -> LoginUser {
        LoginUser {
            user_id: Some(self.user_id),
            username: Some(self.username),
            nickname: self.nickname,
            status: self.status,
            dept_id: self.dept_id,
            roles: self.roles,
            permissions: self.permissions,
            ..LoginUser::default()
        }
    }
}
