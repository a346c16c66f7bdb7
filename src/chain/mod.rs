//! Chain Module
//!
//! Everything on the AMM chain side: queries, routes, envelope building,
//! signing, the top-of-block auction bundle and confirmation tracking.

pub mod auction;
pub mod client;
pub mod envelope;
pub mod keys;
pub mod proto;
pub mod router;
pub mod signing;
pub mod tracker;

pub use auction::{BundleReceipt, BundleSettings, BundleSubmitter, SwapOrder};
pub use client::{AccountState, ChainClient, LcdClient, TxResult};
pub use envelope::{
    min_out_floor, EnvelopeParams, FinalizedEnvelope, SignedTransaction, UnsignedEnvelope,
};
pub use keys::{SignerKey, SigningParty};
pub use router::{RouteProvider, RouteResolver, SqsRouter};
pub use signing::SignerSession;
pub use tracker::{ConfirmationTracker, TxStatus};
