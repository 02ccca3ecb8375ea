//! A MapReduce-compatible implementation of word count.
//!

use anyhow::Result;
use bytes::Bytes;

use common::utils::string_from_bytes;
use common::{KeyValue, MapOutput};

/// Emits `(word, "1")` for every maximal run of letters.
pub fn map(_filename: &str, contents: Bytes) -> MapOutput {
    let s = string_from_bytes(contents)?;
    let words = s
        .split(|c: char| !c.is_alphabetic())
        .filter(|s| !s.is_empty())
        .map(|word| word.to_string())
        .collect::<Vec<_>>();

    let iter = words.into_iter().map(|word| -> Result<KeyValue> {
        Ok(KeyValue::new(word, Bytes::from_static(b"1")))
    });
    Ok(Box::new(iter))
}

pub fn reduce(_key: Bytes, values: Box<dyn Iterator<Item = Bytes> + '_>) -> Result<Bytes> {
    let mut count = 0u64;
    for value in values {
        count += string_from_bytes(value)?.parse::<u64>()?;
    }
    Ok(Bytes::from(count.to_string()))
}
