//! Batcher - correlation layer for stateful events
//!
//! The [`Dispatcher`] shapes `(agent, event)` pairs into queue items and
//! returns a [`CorrelationId`](muxqueue::CorrelationId) without waiting. The
//! [`Waiter`] polls the same queue for that id and consumes the result once.
//! [`BatcherClient`] pairs the two for callers that want both.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use batcher::{BatcherClient, AgentMetadata, DomainEvent};
//!
//! let client = BatcherClient::new(queue, Duration::from_millis(100));
//! let id = client.send_event(&agent, &event)?;
//! let response = client.get_response(&id).await?;
//! ```

pub mod cli;
mod client;
pub mod config;
mod dispatcher;
mod error;
pub mod events;
mod loopback;
pub mod payload;
mod waiter;

pub use client::BatcherClient;
pub use config::{ClientConfig, Config};
pub use dispatcher::Dispatcher;
pub use error::ClientError;
pub use events::{AgentMetadata, DomainEvent, EventData, Host, InventoryKind, ModuleName, Os};
pub use loopback::LoopbackIndexer;
pub use waiter::{DEFAULT_POLL_INTERVAL, Waiter};
