//  METADATA.rs
//    by Lut99
//
//  Created:
//    18 Oct 2026, 10:20:40
//  Last edited:
//    18 Oct 2026, 15:02:19
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the metadata that accompanies incoming RPC calls.
//

use std::collections::HashMap;


/***** LIBRARY *****/
/// Incoming RPC metadata, mapping (lowercase) keys to the ordered list of values sent for them.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Metadata {
    entries: HashMap<String, Vec<String>>,
}
impl Metadata {
    /// Constructor for empty Metadata.
    #[inline]
    pub fn new() -> Self { Self::default() }

    /// Appends a value for the given key, after any values already present for it.
    ///
    /// Keys are case-insensitive and stored in lowercase.
    pub fn append(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.entries.entry(key.as_ref().to_ascii_lowercase()).or_default().push(value.into());
    }

    /// Replaces all values of the given key with the given list.
    pub fn insert(&mut self, key: impl AsRef<str>, values: Vec<String>) { self.entries.insert(key.as_ref().to_ascii_lowercase(), values); }

    /// Returns the values sent for the given key, if the key is present at all.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&[String]> { self.entries.get(&key.to_ascii_lowercase()).map(Vec::as_slice) }

    #[inline]
    pub fn len(&self) -> usize { self.entries.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}
impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut md = Self::new();
        for (key, value) in iter {
            md.append(key, value);
        }
        md
    }
}

#[cfg(feature = "tonic")]
impl From<&tonic::metadata::MetadataMap> for Metadata {
    /// Copies the ASCII entries of a [`tonic`] metadata map. Binary entries and values that are
    /// not visible ASCII are skipped.
    fn from(value: &tonic::metadata::MetadataMap) -> Self {
        use tonic::metadata::KeyAndValueRef;

        let mut md = Self::new();
        for entry in value.iter() {
            if let KeyAndValueRef::Ascii(key, value) = entry {
                if let Ok(value) = value.to_str() {
                    md.append(key.as_str(), value);
                }
            }
        }
        md
    }
}





/***** TESTS *****/
