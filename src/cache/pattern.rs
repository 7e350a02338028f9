//! Key patterns for bulk deletion.
//!
//! `*` matches any run of characters, including an empty one. Every other
//! character matches only itself, and a pattern must cover the whole key.

/// A compiled key pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPattern {
    raw: String,
    /// Literal pieces between `*`s.
    parts: Vec<String>,
}

impl KeyPattern {
    pub fn new(pattern: &str) -> Self {
        Self {
            raw: pattern.to_string(),
            parts: pattern.split('*').map(str::to_string).collect(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `key` matches the whole pattern.
    pub fn matches(&self, key: &str) -> bool {
        // No `*`: exact comparison.
        if self.parts.len() == 1 {
            return key == self.raw;
        }

        let first = &self.parts[0];
        let last = &self.parts[self.parts.len() - 1];

        if !key.starts_with(first.as_str()) {
            return false;
        }
        let mut rest = &key[first.len()..];

        // Middle pieces are matched greedily left to right; leftmost
        // placement leaves the most room for the remaining pieces.
        for part in &self.parts[1..self.parts.len() - 1] {
            match rest.find(part.as_str()) {
                Some(idx) => rest = &rest[idx + part.len()..],
                None => return false,
            }
        }

        rest.ends_with(last.as_str())
    }
}

impl std::fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
