//! Opaque serialized user values.
//!
//! Keys, values and other user objects travel as [`Data`]: bytes the grid
//! stores and compares without interpreting them. Values are produced with
//! MessagePack via `rmp_serde::to_vec_named`, so structs become maps keyed
//! by field name and peers in other languages can read them.
//!
//! # Example
//!
//! ```
//! use gridwire::codec::Data;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Session {
//!     user: String,
//!     hits: u32,
//! }
//!
//! let session = Session { user: "alice".into(), hits: 3 };
//! let data = Data::serialize(&session).unwrap();
//! let decoded: Session = data.deserialize().unwrap();
//! assert_eq!(decoded, session);
//! ```

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// A serialized user value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Data(Bytes);

impl Data {
    /// Wrap bytes that are already serialized.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Serialize a value to MessagePack (struct-as-map).
    #[inline]
    pub fn serialize<T: Serialize>(value: &T) -> Result<Self> {
        let bytes = rmp_serde::to_vec_named(value)?;
        Ok(Self(Bytes::from(bytes)))
    }

    /// Deserialize the held bytes.
    #[inline]
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(rmp_serde::from_slice(&self.0)?)
    }

    /// Borrow the serialized bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Take the serialized bytes.
    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// Serialized length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no bytes are held.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Bytes> for Data {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GridwireError;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Entry {
        id: u64,
        tag: String,
        live: bool,
    }

    #[test]
    fn test_struct_roundtrip() {
        let entry = Entry {
            id: 42,
            tag: "hot".to_string(),
            live: true,
        };
        let data = Data::serialize(&entry).unwrap();
        let decoded: Entry = data.deserialize().unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_structs_serialize_as_maps() {
        let data = Data::serialize(&Entry {
            id: 1,
            tag: String::new(),
            live: false,
        })
        .unwrap();
        // fixmap with 3 entries, not fixarray (0x93)
        assert_eq!(data.as_bytes()[0], 0x83);
    }

    #[test]
    fn test_map_and_option_values() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), -1i64);
        map.insert("b".to_string(), i64::MAX);
        let decoded: HashMap<String, i64> = Data::serialize(&map).unwrap().deserialize().unwrap();
        assert_eq!(decoded, map);

        let none: Option<i32> = None;
        let data = Data::serialize(&none).unwrap();
        assert_eq!(data.as_bytes(), &[0xc0]);
        assert_eq!(data.deserialize::<Option<i32>>().unwrap(), None);
    }

    #[test]
    fn test_invalid_bytes_fail_to_deserialize() {
        let data = Data::from_bytes(&b"\xc1 never valid"[..]);
        let result: Result<Entry> = data.deserialize();
        assert!(matches!(result, Err(GridwireError::DataDecode(_))));
    }

    #[test]
    fn test_equality_is_bytewise() {
        let a = Data::serialize(&"key").unwrap();
        let b = Data::from_bytes(a.clone().into_bytes());
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
        assert!(Data::default().is_empty());
    }
}
