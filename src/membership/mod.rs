//! Accounts and plans: registration, signed activation links and plan
//! subscriptions. Mail and manual generation go through the job pipeline.

pub mod models;
pub mod service;
pub mod store;

pub use models::{Plan, User};
pub use service::{Activation, MembershipError, MembershipService};
pub use store::{MemoryStore, PlanStore, UserStore};
