//! Variable-length codecs.
//!
//! Anything that is not a fixed-width field of the initial frame lives in
//! frames of its own, appended after the initial frame in declaration
//! order:
//!
//! - strings, byte arrays and [`Data`] take one frame each;
//! - a `None` is a single null frame, checked before decoding the value;
//! - lists of variable items are enclosed in a begin frame and an end frame;
//! - lists of fixed-width items are packed into one frame.
//!
//! Decoders take a [`FrameCursor`] and consume exactly the frames their
//! encoder wrote.

use bytes::{Bytes, BytesMut};

use super::data::Data;
use super::fixed_size::{
    decode_int, decode_long, encode_int, encode_long, INT_SIZE_IN_BYTES, LONG_SIZE_IN_BYTES,
};
use crate::error::DecodeError;
use crate::protocol::{Frame, FrameCursor, FrameFlags, Message};

/// Flags that mark a frame as something other than a value.
const MARKER_FLAGS: FrameFlags = FrameFlags::IS_NULL
    .union(FrameFlags::BEGIN_DATA_STRUCTURE)
    .union(FrameFlags::END_DATA_STRUCTURE);

/// Consume a begin frame, failing on anything else.
pub fn expect_begin_frame(
    cursor: &mut FrameCursor<'_>,
    expected: &'static str,
) -> Result<(), DecodeError> {
    let frame = cursor.next_for(expected)?;
    if !frame.is_begin_frame() {
        return Err(DecodeError::UnexpectedFrame {
            expected,
            flags: frame.flags().to_wire(),
        });
    }
    Ok(())
}

/// Take the next frame, failing unless it holds a value.
///
/// Null, begin and end frames are markers; finding one where a value is
/// required means the message is corrupt.
pub fn next_value_frame<'a>(
    cursor: &mut FrameCursor<'a>,
    expected: &'static str,
) -> Result<&'a Frame, DecodeError> {
    let frame = cursor.next_for(expected)?;
    check_value_frame(frame, expected)?;
    Ok(frame)
}

fn check_value_frame(frame: &Frame, expected: &'static str) -> Result<(), DecodeError> {
    if frame.flags().intersects(MARKER_FLAGS) {
        return Err(DecodeError::UnexpectedFrame {
            expected,
            flags: frame.flags().to_wire(),
        });
    }
    Ok(())
}

/// Encode an optional value: a null frame for `None`, the value's frames
/// otherwise.
pub fn encode_nullable<T: ?Sized>(
    message: &mut Message,
    value: Option<&T>,
    encode: impl FnOnce(&mut Message, &T),
) {
    match value {
        Some(value) => encode(message, value),
        None => message.add(Frame::null()),
    }
}

/// Decode an optional value written by [`encode_nullable`].
pub fn decode_nullable<'a, T>(
    cursor: &mut FrameCursor<'a>,
    decode: impl FnOnce(&mut FrameCursor<'a>) -> Result<T, DecodeError>,
) -> Result<Option<T>, DecodeError> {
    if cursor.next_is_null() {
        return Ok(None);
    }
    decode(cursor).map(Some)
}

/// UTF-8 string in its own frame.
pub struct StringCodec;

impl StringCodec {
    /// Append `value` as one frame.
    pub fn encode(message: &mut Message, value: &str) {
        message.add(Frame::with_content(Bytes::copy_from_slice(value.as_bytes())));
    }

    /// Decode the next frame as a string.
    pub fn decode(cursor: &mut FrameCursor<'_>) -> Result<String, DecodeError> {
        Self::decode_frame(next_value_frame(cursor, "string")?)
    }

    /// Decode a string from a frame that was already taken off the cursor.
    pub fn decode_frame(frame: &Frame) -> Result<String, DecodeError> {
        check_value_frame(frame, "string")?;
        std::str::from_utf8(frame.content())
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8)
    }
}

/// Raw bytes in their own frame.
pub struct ByteArrayCodec;

impl ByteArrayCodec {
    /// Append `value` as one frame.
    pub fn encode(message: &mut Message, value: &[u8]) {
        message.add(Frame::with_content(Bytes::copy_from_slice(value)));
    }

    /// Decode the next frame as bytes (zero-copy).
    pub fn decode(cursor: &mut FrameCursor<'_>) -> Result<Bytes, DecodeError> {
        Ok(next_value_frame(cursor, "byte array")?.content_bytes())
    }
}

/// Serialized user value in its own frame.
pub struct DataCodec;

impl DataCodec {
    /// Append `value` as one frame, sharing its buffer.
    pub fn encode(message: &mut Message, value: &Data) {
        message.add(Frame::with_content(value.clone().into_bytes()));
    }

    /// Decode the next frame as [`Data`].
    pub fn decode(cursor: &mut FrameCursor<'_>) -> Result<Data, DecodeError> {
        Ok(Data::from(next_value_frame(cursor, "data")?.content_bytes()))
    }
}

/// List of variable-length items between a begin and an end frame.
pub struct ListMultiFrameCodec;

impl ListMultiFrameCodec {
    /// Append a begin frame, each item's frames, then an end frame.
    pub fn encode<T>(
        message: &mut Message,
        items: &[T],
        mut encode: impl FnMut(&mut Message, &T),
    ) {
        message.add(Frame::begin());
        for item in items {
            encode(message, item);
        }
        message.add(Frame::end());
    }

    /// Like [`encode`](Self::encode), writing a null frame for `None` items.
    pub fn encode_contains_nullable<T>(
        message: &mut Message,
        items: &[Option<T>],
        mut encode: impl FnMut(&mut Message, &T),
    ) {
        message.add(Frame::begin());
        for item in items {
            encode_nullable(message, item.as_ref(), &mut encode);
        }
        message.add(Frame::end());
    }

    /// Decode items until the closing end frame.
    pub fn decode<'a, T>(
        cursor: &mut FrameCursor<'a>,
        mut decode: impl FnMut(&mut FrameCursor<'a>) -> Result<T, DecodeError>,
    ) -> Result<Vec<T>, DecodeError> {
        expect_begin_frame(cursor, "begin of list")?;
        let mut items = Vec::new();
        while !cursor.next_is_end() {
            if !cursor.has_next() {
                return Err(DecodeError::MissingFrame {
                    expected: "end of list",
                });
            }
            items.push(decode(cursor)?);
        }
        Ok(items)
    }

    /// Decode a list written by [`encode_contains_nullable`](Self::encode_contains_nullable).
    pub fn decode_contains_nullable<'a, T>(
        cursor: &mut FrameCursor<'a>,
        mut decode: impl FnMut(&mut FrameCursor<'a>) -> Result<T, DecodeError>,
    ) -> Result<Vec<Option<T>>, DecodeError> {
        Self::decode(cursor, |cursor| decode_nullable(cursor, &mut decode))
    }
}

/// Fixed-width list codec: all items packed into a single frame.
macro_rules! fixed_list_codec {
    ($(#[$doc:meta])* $name:ident, $ty:ty, $size:expr, $encode:ident, $decode:ident) => {
        $(#[$doc])*
        pub struct $name;

        impl $name {
            /// Append all items as one frame.
            pub fn encode(message: &mut Message, items: &[$ty]) {
                let mut content = BytesMut::zeroed(items.len() * $size);
                for (i, item) in items.iter().enumerate() {
                    $encode(&mut content, i * $size, *item);
                }
                message.add(Frame::with_content(content.freeze()));
            }

            /// Decode the next frame as a list.
            pub fn decode(cursor: &mut FrameCursor<'_>) -> Result<Vec<$ty>, DecodeError> {
                Self::decode_frame(cursor.next_for(stringify!($name))?)
            }

            /// Decode a list from a frame already taken off the cursor.
            pub fn decode_frame(frame: &Frame) -> Result<Vec<$ty>, DecodeError> {
                let content = frame.content();
                if content.len() % $size != 0 {
                    return Err(DecodeError::LengthMismatch {
                        declared: content.len() / $size * $size,
                        actual: content.len(),
                    });
                }
                (0..content.len() / $size)
                    .map(|i| $decode(content, i * $size))
                    .collect()
            }
        }
    };
}

fixed_list_codec!(
    /// List of `i32` packed into one frame.
    ListIntegerCodec,
    i32,
    INT_SIZE_IN_BYTES,
    encode_int,
    decode_int
);

fixed_list_codec!(
    /// List of `i64` packed into one frame.
    ListLongCodec,
    i64,
    LONG_SIZE_IN_BYTES,
    encode_long,
    decode_long
);

/// Key/value pairs between a begin and an end frame, key before value.
pub struct EntryListCodec;

impl EntryListCodec {
    /// Append all entries.
    pub fn encode<K, V>(
        message: &mut Message,
        entries: &[(K, V)],
        mut encode_key: impl FnMut(&mut Message, &K),
        mut encode_value: impl FnMut(&mut Message, &V),
    ) {
        message.add(Frame::begin());
        for (key, value) in entries {
            encode_key(message, key);
            encode_value(message, value);
        }
        message.add(Frame::end());
    }

    /// Decode entries until the closing end frame.
    pub fn decode<'a, K, V>(
        cursor: &mut FrameCursor<'a>,
        mut decode_key: impl FnMut(&mut FrameCursor<'a>) -> Result<K, DecodeError>,
        mut decode_value: impl FnMut(&mut FrameCursor<'a>) -> Result<V, DecodeError>,
    ) -> Result<Vec<(K, V)>, DecodeError> {
        expect_begin_frame(cursor, "begin of entry list")?;
        let mut entries = Vec::new();
        while !cursor.next_is_end() {
            if !cursor.has_next() {
                return Err(DecodeError::MissingFrame {
                    expected: "end of entry list",
                });
            }
            let key = decode_key(cursor)?;
            let value = decode_value(cursor)?;
            entries.push((key, value));
        }
        Ok(entries)
    }
}
