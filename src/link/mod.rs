//! Wallet account linking via signed challenges.
//!
//! `connect` issues a [`Challenge`], the user personal-signs its message in
//! their wallet, and `verify` proves control of the account before the link
//! is persisted.

pub mod challenge;
pub mod persistence;
pub mod signature;
pub mod sweeper;
pub mod verification;

pub use challenge::{Challenge, ChallengeService};
pub use persistence::{AccountLink, LinkPersistenceService};
pub use signature::{
    Eip191Backend, SignatureBackend, SignatureError, SignatureVerifier, personal_sign,
};
pub use sweeper::spawn_sweeper;
pub use verification::VerificationService;
