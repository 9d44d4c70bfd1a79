//! TXT record key/value codec.
//!
//! DNS-SD carries service metadata as a list of `key=value` byte strings
//! inside a TXT record. Values are opaque bytes on the wire; a lossy UTF-8
//! view is offered for convenience, the raw bytes stay authoritative.

/// A single TXT value: UTF-8 text or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxtValue {
    Text(String),
    Binary(Vec<u8>),
}

impl TxtValue {
    /// The value as bytes, regardless of representation.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            TxtValue::Text(s) => s.as_bytes(),
            TxtValue::Binary(b) => b,
        }
    }

    /// The value as text, if it is the text representation.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TxtValue::Text(s) => Some(s),
            TxtValue::Binary(_) => None,
        }
    }
}

impl From<&str> for TxtValue {
    fn from(value: &str) -> Self {
        TxtValue::Text(value.to_string())
    }
}

impl From<String> for TxtValue {
    fn from(value: String) -> Self {
        TxtValue::Text(value)
    }
}

impl From<Vec<u8>> for TxtValue {
    fn from(value: Vec<u8>) -> Self {
        TxtValue::Binary(value)
    }
}

impl From<bool> for TxtValue {
    fn from(value: bool) -> Self {
        TxtValue::Text(value.to_string())
    }
}

macro_rules! txt_value_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for TxtValue {
            fn from(value: $ty) -> Self {
                TxtValue::Text(value.to_string())
            }
        })*
    };
}

txt_value_from_int!(u16, u32, u64, i32, i64);

/// An ordered key/value map for TXT records.
///
/// Insertion order is preserved; re-inserting an existing key replaces the
/// value in place. Key lookup is ASCII case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxtMap {
    entries: Vec<(String, TxtValue)>,
}

impl TxtMap {
    pub fn new() -> Self {
        TxtMap::default()
    }

    /// Insert a value, replacing any existing entry for the key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<TxtValue>) {
        let key = key.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&TxtValue> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TxtValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<TxtValue>> FromIterator<(K, V)> for TxtMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = TxtMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Encode a TXT map into `key=value` byte strings, one per entry, in
/// insertion order.
pub fn encode(map: &TxtMap) -> Vec<Vec<u8>> {
    map.iter()
        .map(|(key, value)| {
            let mut entry = Vec::with_capacity(key.len() + 1 + value.as_bytes().len());
            entry.extend_from_slice(key.as_bytes());
            entry.push(b'=');
            entry.extend_from_slice(value.as_bytes());
            entry
        })
        .collect()
}

/// Decode `key=value` byte strings into a TXT map.
///
/// The key is everything before the first `=`; an entry without `=` becomes
/// a key with an empty value. Entries with an empty key are discarded. With
/// `binary` set, values stay raw bytes; otherwise they are decoded as UTF-8
/// (lossily).
pub fn decode(entries: &[Vec<u8>], binary: bool) -> TxtMap {
    let mut map = TxtMap::new();
    for entry in entries {
        let split = entry.iter().position(|&b| b == b'=');
        let (key, value) = match split {
            Some(at) => (&entry[..at], &entry[at + 1..]),
            None => (&entry[..], &[][..]),
        };
        if key.is_empty() {
            continue;
        }
        let key = String::from_utf8_lossy(key).into_owned();
        let value = if binary {
            TxtValue::Binary(value.to_vec())
        } else {
            TxtValue::Text(String::from_utf8_lossy(value).into_owned())
        };
        map.insert(key, value);
    }
    map
}
