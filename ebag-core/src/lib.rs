#![doc = "ebag-core: staged pipeline engine for ebag."]

//! Independent asynchronous stages are chained through capacity-one handoff
//! pipes into two flows: download (remote listing down to disk) and upload
//! (watched local files up to the remote store). Instrumentation stages can be
//! slotted between any two stages without changing what flows through them.
//!
//! The remote store itself is behind the [`contract::SyncProvider`] trait.

pub mod contract;
pub mod error;
pub mod event;
pub mod instrument;
pub mod pipe;
pub mod pipeline;
pub mod sink;
pub mod synchronise;

pub use error::SyncError;
