//! Weak entity tags for records and collections.
//!
//! A tag is `W/"<base64url(sha1(bytes))>"`. Record tags hash the record's
//! canonical JSON; collection tags hash the ordered member list, every field
//! length-prefixed so `("ab", "c")` and `("a", "bc")` never collide.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Serialize;
use sha1::{Digest, Sha1};

/// A weak HTTP entity tag, already quoted and prefixed (`W/"..."`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ETag(String);

impl ETag {
    /// Tag the given bytes.
    pub fn compute(data: &[u8]) -> Self {
        Self::from_digest(Sha1::digest(data).as_slice())
    }

    /// Tag the canonical JSON encoding of `value`.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if `value` cannot be encoded as JSON.
    pub fn of_json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        let buf = serde_json::to_vec(value)?;
        Ok(Self::compute(&buf))
    }

    fn from_digest(sum: &[u8]) -> Self {
        Self(format!("W/\"{}\"", URL_SAFE_NO_PAD.encode(sum)))
    }

    /// Return the full header value (including `W/` and quotes).
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the zero value (a record that was never tagged).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Exact comparison against a raw `If-None-Match` header value.
    pub fn matches(&self, validator: &str) -> bool {
        !self.0.is_empty() && self.0 == validator
    }
}

impl std::fmt::Display for ETag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ETag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Incremental builder for collection tags.
///
/// ```
/// use xq_schema::{ETag, ETagBuilder};
///
/// let child = ETag::compute(b"pkg");
/// let mut builder = ETagBuilder::new(1);
/// builder.member("pkg-1.0_1", &child);
/// let tag = builder.finish();
/// assert!(tag.as_str().starts_with("W/\""));
/// ```
#[derive(Debug, Clone)]
pub struct ETagBuilder {
    hasher: Sha1,
}

impl ETagBuilder {
    /// Start a collection tag over `members` entries.
    pub fn new(members: usize) -> Self {
        let mut hasher = Sha1::new();
        hasher.update((members as i64).to_le_bytes());
        Self { hasher }
    }

    fn field(&mut self, s: &str) {
        self.hasher.update((s.len() as i64).to_le_bytes());
        self.hasher.update(s.as_bytes());
    }

    /// Add one `(identity, child tag)` pair. Order matters.
    pub fn member(&mut self, id: &str, tag: &ETag) -> &mut Self {
        self.field(id);
        self.field(tag.as_str());
        self
    }

    /// Finish hashing and format the weak tag.
    pub fn finish(self) -> ETag {
        ETag::from_digest(self.hasher.finalize().as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(members: &[(&str, &str)]) -> ETag {
        let mut builder = ETagBuilder::new(members.len());
        for (id, child) in members {
            builder.member(id, &ETag::compute(child.as_bytes()));
        }
        builder.finish()
    }

    #[test]
    fn weak_format() {
        let tag = ETag::compute(b"hello world");
        let s = tag.as_str();
        assert!(s.starts_with("W/\""));
        assert!(s.ends_with('"'));
        // sha1 = 20 bytes = 27 base64 chars without padding
        assert_eq!(s.len(), 3 + 27 + 1);
        let inner = &s[3..s.len() - 1];
        assert!(!inner.contains(['+', '/', '=']));
    }

    #[test]
    fn deterministic() {
        let a = collection(&[("a", "1"), ("b", "2")]);
        let b = collection(&[("a", "1"), ("b", "2")]);
        assert_eq!(a, b);
    }

    #[test]
    fn order_changes_tag() {
        let a = collection(&[("a", "1"), ("b", "2")]);
        let b = collection(&[("b", "2"), ("a", "1")]);
        assert_ne!(a, b);
    }

    #[test]
    fn child_changes_tag() {
        let a = collection(&[("a", "1"), ("b", "2")]);
        let b = collection(&[("a", "1"), ("b", "3")]);
        assert_ne!(a, b);
    }

    #[test]
    fn membership_changes_tag() {
        let a = collection(&[("a", "1")]);
        let b = collection(&[("a", "1"), ("b", "2")]);
        assert_ne!(a, b);
        assert_ne!(collection(&[]), a);
    }

    #[test]
    fn length_prefix_disambiguates() {
        let untagged = ETag::default();
        let mut x = ETagBuilder::new(2);
        x.member("ab", &untagged).member("c", &untagged);
        let mut y = ETagBuilder::new(2);
        y.member("a", &untagged).member("bc", &untagged);
        assert_ne!(x.finish(), y.finish());
    }

    #[test]
    fn matches_exactly() {
        let tag = ETag::compute(b"x");
        assert!(tag.matches(tag.as_str()));
        assert!(!tag.matches(tag.as_str().trim_start_matches("W/")));
        assert!(!ETag::default().matches(""));
    }
}
