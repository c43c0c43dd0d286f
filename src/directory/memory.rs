//! In-memory directory backend for development and tests.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::{DirectoryClient, DirectoryError, Recipient};

/// Directory client backed by an in-process user table.
pub struct MemoryDirectoryClient {
    users: DashMap<Uuid, Recipient>,
}

impl MemoryDirectoryClient {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
        }
    }

    /// Register or replace a user's contact details.
    pub fn insert(&self, user_id: Uuid, recipient: Recipient) {
        self.users.insert(user_id, recipient);
    }

    /// Remove a user from the table.
    pub fn remove(&self, user_id: &Uuid) {
        self.users.remove(user_id);
    }

    /// Number of registered users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl Default for MemoryDirectoryClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryClient for MemoryDirectoryClient {
    async fn lookup(&self, user_id: Uuid) -> Result<Recipient, DirectoryError> {
        self.users
            .get(&user_id)
            .map(|entry| entry.clone())
            .ok_or(DirectoryError::NotFound(user_id))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
