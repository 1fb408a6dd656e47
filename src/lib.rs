//! Bet Relay Bot
//!
//! Watches a Telegram group for horse-racing tips, turns them into bet
//! records and relays them to storage and a placement worker.
//!
//! ## Architecture
//!
//! ```text
//! MessageSource (Telegram) → MessageSink (classify, parse) → intake queue
//!     → processing loop → handlers (BetRouter → store + execution queue)
//!                                                   ↓
//!                                            ExecutionWorker → BetExecutor
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod ingester;
pub mod pipeline;
pub mod storage;
pub mod types;

#[cfg(test)]
mod types_tests;
#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod integration_tests;
