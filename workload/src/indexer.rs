//! An inverted index: for every word, the input files it appears in.

use std::collections::BTreeSet;

use anyhow::Result;
use bytes::Bytes;

use common::utils::string_from_bytes;
use common::{KeyValue, MapOutput};

/// Emits `(word, filename)` once per distinct word of the file.
pub fn map(filename: &str, contents: Bytes) -> MapOutput {
    let s = string_from_bytes(contents)?;
    let words: BTreeSet<String> = s
        .split(|c: char| !c.is_alphabetic())
        .filter(|s| !s.is_empty())
        .map(|word| word.to_string())
        .collect();

    let document = Bytes::from(filename.to_string());
    let iter = words.into_iter().map(move |word| -> Result<KeyValue> {
        Ok(KeyValue::new(word, document.clone()))
    });
    Ok(Box::new(iter))
}

/// Outputs `"<count> <file>,<file>,..."` with the files sorted and deduplicated.
pub fn reduce(_key: Bytes, values: Box<dyn Iterator<Item = Bytes> + '_>) -> Result<Bytes> {
    let documents = values
        .map(string_from_bytes)
        .collect::<Result<BTreeSet<_>>>()?;
    let joined = documents.iter().map(String::as_str).collect::<Vec<_>>().join(",");
    Ok(Bytes::from(format!("{} {}", documents.len(), joined)))
}
