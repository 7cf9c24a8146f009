//! # gridwire
//!
//! Binary client protocol substrate for an in-memory data grid.
//!
//! Every request and response travels as a [`Message`]: an ordered list of
//! frames, each a `[length][flags][content]` record. The first frame carries
//! the message type, correlation id and partition id at fixed offsets;
//! variable-size fields follow as their own frames.
//!
//! ## Architecture
//!
//! - **Protocol** ([`protocol`]): frames, messages, the wire format, partial
//!   reads and fragmentation of large messages
//! - **Codecs** ([`codec`]): fixed-size fields, variable-size values and one
//!   [`OperationCodec`] per operation
//! - **Dispatch** ([`handler`]): message type registry and typed handlers
//! - **Transport** ([`transport`], [`server`], [`client`]): TCP connections
//!   with a writer task and a read loop each
//! - **Fault monitor** ([`monitor`]): counts transport faults per endpoint
//!   and removes endpoints that keep failing
//!
//! ## Example
//!
//! ```
//! use gridwire::codec::ops::{MapGetCodec, MapGetRequest};
//! use gridwire::codec::{Data, OperationCodec};
//!
//! let request = MapGetRequest {
//!     name: "users".into(),
//!     key: Data::serialize(&42u32).unwrap(),
//!     thread_id: 7,
//! };
//! let message = MapGetCodec::encode_request(&request);
//! assert!(message.is_retryable());
//! assert_eq!(MapGetCodec::decode_request(&message).unwrap(), request);
//! ```

pub mod address;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod monitor;
pub mod protocol;
pub mod server;
pub mod transport;
pub mod writer;

pub use address::Address;
pub use client::ClientConnection;
pub use codec::{Data, ErrorHolder, OperationCodec};
pub use config::ProtocolConfig;
pub use error::{DecodeError, GridwireError, Result};
pub use handler::{Dispatcher, RequestContext};
pub use monitor::{FaultMonitor, FaultState, Membership};
pub use protocol::{Frame, Message};
pub use server::Server;
