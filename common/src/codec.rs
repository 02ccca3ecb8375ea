//! Encoding of intermediate records.
//!
//! Every record is self-contained: a big-endian `u32` key length, the key,
//! a big-endian `u32` value length, then the value. Records are appended
//! back to back, so a file is just a concatenation of them.

use anyhow::{bail, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::KeyValue;

const LEN_PREFIX: usize = std::mem::size_of::<u32>();

/// Append the encoding of `kv` to `buf`.
pub fn encode_record(kv: &KeyValue, buf: &mut BytesMut) {
    buf.reserve(2 * LEN_PREFIX + kv.key.len() + kv.value.len());
    buf.put_u32(kv.key.len() as u32);
    buf.put_slice(&kv.key);
    buf.put_u32(kv.value.len() as u32);
    buf.put_slice(&kv.value);
}

/// Encode a batch of records into one contiguous buffer.
pub fn encode_records<'a>(records: impl IntoIterator<Item = &'a KeyValue>) -> Bytes {
    let mut buf = BytesMut::new();
    for kv in records {
        encode_record(kv, &mut buf);
    }
    buf.freeze()
}

fn take_field(buf: &mut Bytes) -> Result<Bytes> {
    if buf.remaining() < LEN_PREFIX {
        bail!("truncated record: missing length prefix");
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        bail!(
            "truncated record: expected {len} bytes, found {}",
            buf.remaining()
        );
    }
    Ok(buf.split_to(len))
}

/// Decode every record in `buf`, in append order.
///
/// A trailing partial record is an error rather than silently dropped.
pub fn decode_records(mut buf: Bytes) -> Result<Vec<KeyValue>> {
    let mut records = Vec::new();
    while buf.has_remaining() {
        let key = take_field(&mut buf)?;
        let value = take_field(&mut buf)?;
        records.push(KeyValue { key, value });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_in_append_order() {
        let records = vec![
            KeyValue::new("b", "1"),
            KeyValue::new("a", ""),
            KeyValue::new("", "x y z"),
        ];
        let decoded = decode_records(encode_records(&records)).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn values_may_contain_separators() {
        let kv = KeyValue::new("key with spaces", "line\nbreak\0nul");
        let decoded = decode_records(encode_records([&kv])).unwrap();
        assert_eq!(decoded, vec![kv]);
    }

    #[test]
    fn empty_input_has_no_records() {
        assert!(decode_records(Bytes::new()).unwrap().is_empty());
    }

    #[test]
    fn truncated_record_is_an_error() {
        let encoded = encode_records([&KeyValue::new("word", "1")]);
        let truncated = encoded.slice(..encoded.len() - 1);
        assert!(decode_records(truncated).is_err());

        let only_prefix = encoded.slice(..2);
        assert!(decode_records(only_prefix).is_err());
    }
}
