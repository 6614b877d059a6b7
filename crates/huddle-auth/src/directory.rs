//! User profiles and the directory that resolves them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Public user profile, immutable for a connection's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Stable user id, the token subject.
    pub id: String,
    /// Registered email address.
    pub email: String,
    /// Free-form display name; may be empty.
    #[serde(default)]
    pub display_name: String,
}

/// Resolves an authenticated subject id to its public profile.
///
/// Credential storage and password hashing live behind this trait;
/// the signaling plane only ever reads profiles.
pub trait UserDirectory: Send + Sync {
    /// Look up a user by subject id. `None` closes the handshake.
    fn resolve(&self, subject: &str) -> Option<User>;
}

/// Directory backed by an in-process map.
///
/// The production deployment loads this from a user file at startup;
/// tests build it inline.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: HashMap<String, User>,
}

impl InMemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from a list of users, keyed by id.
    pub fn from_users(users: impl IntoIterator<Item = User>) -> Self {
        Self { users: users.into_iter().map(|u| (u.id.clone(), u)).collect() }
    }

    /// Insert or replace a user.
    pub fn insert(&mut self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    /// Number of known users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserDirectory for InMemoryDirectory {
    fn resolve(&self, subject: &str) -> Option<User> {
        self.users.get(subject).cloned()
    }
}

/// Derive the username shown to other participants.
///
/// Fallback chain: trimmed display name, then the local part of the
/// email (before `@`), then `participant-` plus the first 8 characters
/// of the user id.
pub fn derive_username(user: &User) -> String {
    let display = user.display_name.trim();
    if !display.is_empty() {
        return display.to_string();
    }

    let local = user.email.split('@').next().unwrap_or("").trim();
    if !local.is_empty() {
        return local.to_string();
    }

    let short: String = user.id.chars().take(8).collect();
    format!("participant-{short}")
}
