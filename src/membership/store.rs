// Storage seams for users and plans. The schema lives elsewhere; the
// in-memory store backs tests and local runs.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{Plan, User};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Option<User>;
    async fn get_by_email(&self, email: &str) -> Option<User>;
    async fn insert(&self, user: User);
    async fn update(&self, user: User) -> bool;
    async fn delete(&self, id: Uuid) -> bool;
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn all(&self) -> Vec<Plan>;
    async fn get(&self, id: i64) -> Option<Plan>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    plans: RwLock<Vec<Plan>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the Bronze, Silver and Gold plans
    pub fn with_default_plans() -> Self {
        Self::with_plans(vec![
            Plan::new(1, "Bronze", 1000),
            Plan::new(2, "Silver", 2000),
            Plan::new(3, "Gold", 3000),
        ])
    }

    pub fn with_plans(plans: Vec<Plan>) -> Self {
        Self {
            users: RwLock::default(),
            plans: RwLock::new(plans),
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Option<User> {
        self.users.read().await.get(&id).cloned()
    }

    async fn get_by_email(&self, email: &str) -> Option<User> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    async fn update(&self, user: User) -> bool {
        let mut users = self.users.write().await;
        match users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user;
                true
            }
            None => false,
        }
    }

    async fn delete(&self, id: Uuid) -> bool {
        self.users.write().await.remove(&id).is_some()
    }
}

#[async_trait]
impl PlanStore for MemoryStore {
    async fn all(&self) -> Vec<Plan> {
        self.plans.read().await.clone()
    }

    async fn get(&self, id: i64) -> Option<Plan> {
        self.plans.read().await.iter().find(|p| p.id == id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_and_delete_report_missing_users() {
        let store = MemoryStore::with_default_plans();
        let user = User::new("ada@example.com", "Ada", "Lovelace");

        assert!(!store.update(user.clone()).await);
        store.insert(user.clone()).await;
        assert!(store.update(user.clone()).await);

        assert!(store.delete(user.id).await);
        assert!(!store.delete(user.id).await);
        assert!(UserStore::get(&store, user.id).await.is_none());
    }

    #[tokio::test]
    async fn test_default_plans() {
        let store = MemoryStore::with_default_plans();
        let names: Vec<_> = store.all().await.into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["Bronze", "Silver", "Gold"]);
        assert_eq!(PlanStore::get(&store, 2).await.unwrap().amount_for_display(), "$20.00");
    }
}
