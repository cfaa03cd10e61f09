use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::documents::{PlanSummary, Recipient};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub active: bool,
    pub is_admin: bool,
    pub plan: Option<Plan>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A new, not yet activated account
    pub fn new(email: impl Into<String>, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            active: false,
            is_admin: false,
            plan: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn recipient(&self) -> Recipient {
        Recipient {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: i64,
    pub name: String,
    /// Price in cents
    pub amount: i64,
}

impl Plan {
    pub fn new(id: i64, name: impl Into<String>, amount: i64) -> Self {
        Self {
            id,
            name: name.into(),
            amount,
        }
    }

    /// Price formatted for display, e.g. `$15.00`
    pub fn amount_for_display(&self) -> String {
        format!("${}.{:02}", self.amount / 100, self.amount % 100)
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            id: self.id,
            name: self.name.clone(),
        }
    }
}
