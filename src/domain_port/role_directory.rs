use crate::domain_model::UserId;

#[derive(Debug, thiserror::Error)]
pub enum RoleDirectoryError {
    #[error("user not found")]
    UserNotFound,
    #[error("store error: {0}")]
    Store(String),
}

/// Source of a user's current role slugs. Backed by the user repository.
#[async_trait::async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn roles_for(&self, user_id: UserId) -> Result<Vec<String>, RoleDirectoryError>;
}
