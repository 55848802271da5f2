//! Points ledger engine.
//!
//! The engine records signed point flows per account on top of a sea-orm
//! database, derives balances from them, runs the reserve/finalize protocol for
//! debits and records every flow change on a store-backed feed read through
//! [`ChangeFeedReceiver`].

pub use balance::Balance;
pub use change_feed::{ChangeFeedReceiver, DEFAULT_FEED_POLL_INTERVAL, FlowChange};
pub use error::EngineError;
pub use flows::{Flow, FlowKind, FlowState};
pub use metadata::{
    AlertRedemptionMetadata, CheerMetadata, GiftSubMetadata, MAX_STORED_MESSAGE_LEN,
    ManualCreditMetadata, SubscriptionMetadata, describe,
};
pub use ops::{
    DEFAULT_PAGE_SIZE, DEFAULT_TOKEN_TTL, Engine, EngineBuilder, MAX_PAGE_SIZE, SubscriptionCredit,
};
pub use records::{HistoryPage, TransactionRecord};

mod balance;
mod change_feed;
mod error;
mod flows;
mod metadata;
mod ops;
mod records;
mod tokens;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
