use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use super::models::User;
use super::store::{PlanStore, UserStore};
use crate::links::{LinkSigner, LinkStatus};
use crate::queue::{DocumentJob, JobQueue, NotificationJob, PipelineError};

#[derive(Error, Debug)]
pub enum MembershipError {
    #[error("an account already exists for {0}")]
    EmailTaken(String),

    #[error("user not found")]
    UserNotFound,

    #[error("plan {0} not found")]
    PlanNotFound(i64),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Result of following an activation link
#[derive(Debug, Clone)]
pub enum Activation {
    Activated(User),
    Invalid,
    Expired,
}

impl Activation {
    /// Flash message shown to the user
    pub fn flash(&self) -> &'static str {
        match self {
            Activation::Activated(_) => "Account activated. You can now log in.",
            Activation::Invalid => LinkStatus::Invalid.message(),
            Activation::Expired => LinkStatus::Expired.message(),
        }
    }
}

/// Registration, activation and subscription. Slow work is handed to the
/// job pipeline; every method returns as soon as its jobs are queued.
pub struct MembershipService {
    users: Arc<dyn UserStore>,
    plans: Arc<dyn PlanStore>,
    signer: LinkSigner,
    queue: JobQueue,
    base_url: String,
    link_window_minutes: i64,
}

impl MembershipService {
    pub fn new(
        users: Arc<dyn UserStore>,
        plans: Arc<dyn PlanStore>,
        signer: LinkSigner,
        queue: JobQueue,
        base_url: impl Into<String>,
        link_window_minutes: i64,
    ) -> Self {
        Self {
            users,
            plans,
            signer,
            queue,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            link_window_minutes,
        }
    }

    /// Signed link that activates the account for `email`
    pub fn activation_link(&self, email: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(email.as_bytes()).collect();
        self.signer
            .sign(&format!("{}/activate?email={encoded}", self.base_url))
    }

    /// Create an inactive account and mail the activation link
    pub async fn register(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User, MembershipError> {
        if self.users.get_by_email(email).await.is_some() {
            return Err(MembershipError::EmailTaken(email.to_string()));
        }

        let user = User::new(email, first_name, last_name);
        self.users.insert(user.clone()).await;

        let link = self.activation_link(&user.email);
        let job = NotificationJob::new(&user.email, "Activate your account")
            .with_template("confirmation-email")
            .with_payload(json!({
                "first_name": user.first_name,
                "link": link,
            }));
        if let Err(e) = self.queue.enqueue(job).await {
            // Without the mail the account could never be activated
            self.users.delete(user.id).await;
            warn!(user_id = %user.id, "Activation mail not queued; registration rolled back");
            return Err(e.into());
        }

        info!(user_id = %user.id, "User registered; activation mail queued");
        Ok(user)
    }

    /// Check an activation link and activate the account it names
    pub async fn activate(&self, link: &str) -> Result<Activation, MembershipError> {
        match self.signer.check(link, self.link_window_minutes) {
            LinkStatus::Valid => {}
            LinkStatus::Invalid => {
                warn!("Activation link failed verification");
                return Ok(Activation::Invalid);
            }
            LinkStatus::Expired => return Ok(Activation::Expired),
        }

        let Some(email) = email_param(link) else {
            return Ok(Activation::Invalid);
        };
        let mut user = self
            .users
            .get_by_email(&email)
            .await
            .ok_or(MembershipError::UserNotFound)?;

        if !user.active {
            user.active = true;
            user.updated_at = Utc::now();
            if !self.users.update(user.clone()).await {
                return Err(MembershipError::UserNotFound);
            }
            info!(user_id = %user.id, "Account activated");
        }
        Ok(Activation::Activated(user))
    }

    /// Subscribe the user to a plan, mail the invoice and queue the manual
    pub async fn subscribe(&self, user_id: Uuid, plan_id: i64) -> Result<User, MembershipError> {
        let plan = self
            .plans
            .get(plan_id)
            .await
            .ok_or(MembershipError::PlanNotFound(plan_id))?;
        let mut user = self
            .users
            .get(user_id)
            .await
            .ok_or(MembershipError::UserNotFound)?;

        // Queue first: a closed pipeline leaves the account unchanged
        let invoice = NotificationJob::new(&user.email, "Your invoice")
            .with_template("invoice")
            .with_payload(json!({
                "first_name": user.first_name,
                "plan": plan.name,
                "amount": plan.amount_for_display(),
            }));
        self.queue.enqueue(invoice).await?;

        let manual = NotificationJob::new(&user.email, "Your manual")
            .with_template("manual")
            .with_payload(json!({ "first_name": user.first_name, "plan": plan.name }));
        self.queue
            .enqueue(DocumentJob::new(user.recipient(), plan.summary()).then_notify(manual))
            .await?;

        user.plan = Some(plan.clone());
        user.updated_at = Utc::now();
        if !self.users.update(user.clone()).await {
            return Err(MembershipError::UserNotFound);
        }

        info!(user_id = %user.id, plan = %plan.name, "User subscribed");
        Ok(user)
    }
}

fn email_param(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "email")
        .map(|(_, value)| value.into_owned())
}
