//! Codec module - turning values into frames and back.
//!
//! Layers, leaves first:
//!
//! - [`fixed_size`] - fixed-width fields at byte offsets inside a frame
//! - [`builtin`] - strings, bytes, [`Data`], nullable values and lists as
//!   extra frames
//! - [`OperationCodec`] - the request/response contract built from the two
//!   layers above, with implementations in [`ops`]
//! - [`ErrorsCodec`] - exception responses carrying [`ErrorHolder`]s
//!
//! # Design
//!
//! Codecs are marker structs with associated functions rather than trait
//! objects, so the codec for a message is chosen at compile time. Dispatch
//! by message type happens once, in [`crate::handler`].
//!
//! # Example
//!
//! ```
//! use gridwire::codec::ops::{AddPnCounterConfigRequest, DynamicConfigAddPnCounterConfigCodec};
//! use gridwire::codec::OperationCodec;
//!
//! let request = AddPnCounterConfigRequest {
//!     name: "counters".into(),
//!     replica_count: 3,
//!     statistics_enabled: true,
//!     split_brain_protection_name: Some("sbp-1".into()),
//! };
//! let message = DynamicConfigAddPnCounterConfigCodec::encode_request(&request);
//! let decoded = DynamicConfigAddPnCounterConfigCodec::decode_request(&message).unwrap();
//! assert_eq!(decoded, request);
//! ```

pub mod builtin;
mod data;
mod error_holder;
pub mod fixed_size;
mod operation;
pub mod ops;

pub use data::Data;
pub use error_holder::{
    ErrorCode, ErrorHolder, ErrorHolderCodec, ErrorsCodec, EXCEPTION_MESSAGE_TYPE,
};
pub use operation::{
    initial_frame_cursor, request_initial_frame, request_message, response_initial_frame,
    response_message, InitialFrame, OperationCodec, ANY_PARTITION,
};
