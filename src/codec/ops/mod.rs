//! Operation codecs.
//!
//! Each submodule implements [`OperationCodec`](super::OperationCodec) for
//! one operation. All of them follow the same layout rules, so adding an
//! operation means copying the closest one and changing its fields.

mod atomic_long_add_and_get;
mod client_ping;
mod dynamic_config_add_pn_counter_config;
mod map_get;
mod map_put;

pub use atomic_long_add_and_get::{AddAndGetRequest, AtomicLongAddAndGetCodec};
pub use client_ping::ClientPingCodec;
pub use dynamic_config_add_pn_counter_config::{
    AddPnCounterConfigRequest, DynamicConfigAddPnCounterConfigCodec,
};
pub use map_get::{MapGetCodec, MapGetRequest};
pub use map_put::{MapPutCodec, MapPutRequest};
