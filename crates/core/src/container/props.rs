//! Insertion-ordered string-to-string property bag, used for both KTX1 and
//! KTX2 key/value metadata blocks. Byte-exact round trip requires preserving
//! insertion order and rejecting duplicate keys on parse.

use indexmap::IndexMap;

use crate::error::{KtxforgeError, Result};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Props {
    entries: IndexMap<String, String>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(KtxforgeError::InconsistentLevelTable(format!(
                "duplicate property key: {key}"
            )));
        }
        self.entries.insert(key, value.into());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a KTX1-style key/value block: repeated `[u32 len][key\0value\0][pad to 4]`.
    pub fn parse_ktx1(bytes: &[u8]) -> Result<Self> {
        let mut props = Self::new();
        let mut cursor = 0usize;
        while cursor < bytes.len() {
            if cursor + 4 > bytes.len() {
                return Err(KtxforgeError::TruncatedHeader);
            }
            let entry_len = u32::from_le_bytes(bytes[cursor..cursor + 4].try_into().unwrap()) as usize;
            cursor += 4;
            if cursor + entry_len > bytes.len() {
                return Err(KtxforgeError::TruncatedHeader);
            }
            let entry = &bytes[cursor..cursor + entry_len];
            let nul = entry
                .iter()
                .position(|&b| b == 0)
                .ok_or(KtxforgeError::TruncatedHeader)?;
            let key = String::from_utf8_lossy(&entry[..nul]).into_owned();
            let value_bytes = &entry[nul + 1..];
            let value_nul = value_bytes.iter().position(|&b| b == 0).unwrap_or(value_bytes.len());
            let value = String::from_utf8_lossy(&value_bytes[..value_nul]).into_owned();
            props.insert(key, value)?;
            let padded = (entry_len + 3) & !3;
            cursor += padded - entry_len;
        }
        Ok(props)
    }

    pub fn write_ktx1(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (k, v) in self.iter() {
            let mut entry = Vec::with_capacity(k.len() + v.len() + 2);
            entry.extend_from_slice(k.as_bytes());
            entry.push(0);
            entry.extend_from_slice(v.as_bytes());
            entry.push(0);
            let entry_len = entry.len() as u32;
            out.extend_from_slice(&entry_len.to_le_bytes());
            out.extend_from_slice(&entry);
            let padded = (entry.len() + 3) & !3;
            out.resize(out.len() + (padded - entry.len()), 0);
        }
        out
    }

    /// KTX2 key/value data is the same shape but entries are sorted by key
    /// at write time per the format's recommendation; we preserve insertion
    /// order for reads and leave sort ordering to the caller on writes.
    pub fn parse_ktx2(bytes: &[u8]) -> Result<Self> {
        Self::parse_ktx1(bytes)
    }

    pub fn write_ktx2(&self) -> Vec<u8> {
        self.write_ktx1()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_ktx1_bytes() {
        let mut props = Props::new();
        props.insert("KTXorientation", "S=r,T=d").unwrap();
        props.insert("provenance", "ktxforge").unwrap();
        let bytes = props.write_ktx1();
        let parsed = Props::parse_ktx1(&bytes).unwrap();
        assert_eq!(parsed, props);
        assert_eq!(parsed.iter().next().unwrap().0, "KTXorientation");
    }

    #[test]
    fn rejects_duplicate_keys() {
        let mut props = Props::new();
        props.insert("a", "1").unwrap();
        assert!(props.insert("a", "2").is_err());
    }

    #[test]
    fn empty_props_roundtrip() {
        let props = Props::new();
        let bytes = props.write_ktx1();
        assert!(bytes.is_empty());
        assert_eq!(Props::parse_ktx1(&bytes).unwrap(), props);
    }
}
