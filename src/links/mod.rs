//! Tamper-evident, time-limited links (account activation)

pub mod signer;

pub use signer::{LinkSigner, LinkStatus, SIGNATURE_PARAM, TIMESTAMP_PARAM};
