use crate::domain_model::UserId;
use crate::domain_port::{RoleDirectory, RoleDirectoryError};
use dashmap::DashMap;

/// Role assignments held in memory; users without an assignment get the
/// default roles.
pub struct MemoryRoleDirectory {
    assignments: DashMap<UserId, Vec<String>>,
    default_roles: Vec<String>,
}

impl MemoryRoleDirectory {
    pub fn new(default_roles: Vec<String>) -> Self {
        Self {
            assignments: DashMap::new(),
            default_roles,
        }
    }

    pub fn assign(&self, user_id: UserId, roles: Vec<String>) {
        self.assignments.insert(user_id, roles);
    }
}

#[async_trait::async_trait]
impl RoleDirectory for MemoryRoleDirectory {
    async fn roles_for(&self, user_id: UserId) -> Result<Vec<String>, RoleDirectoryError> {
        Ok(self
            .assignments
            .get(&user_id)
            .map(|roles| roles.clone())
            .unwrap_or_else(|| self.default_roles.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn assigned_roles_override_default() {
        let directory = MemoryRoleDirectory::new(vec!["viewer".to_string()]);
        let alice = UserId(uuid::Uuid::new_v4());
        let bob = UserId(uuid::Uuid::new_v4());
        directory.assign(alice, vec!["admin".to_string()]);

        assert_eq!(directory.roles_for(alice).await.unwrap(), vec!["admin"]);
        assert_eq!(directory.roles_for(bob).await.unwrap(), vec!["viewer"]);
    }
}
