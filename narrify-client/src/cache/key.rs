//! Cache keys and key filters.

use narrify_core::PostId;
use std::fmt;
use std::sync::Arc;

/// One primitive segment of a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Str(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::Str(value)
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        KeyPart::Int(value)
    }
}

impl From<bool> for KeyPart {
    fn from(value: bool) -> Self {
        KeyPart::Bool(value)
    }
}

impl From<PostId> for KeyPart {
    fn from(value: PostId) -> Self {
        KeyPart::Int(value.get())
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Str(s) => write!(f, "{:?}", s),
            KeyPart::Int(i) => write!(f, "{}", i),
            KeyPart::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Ordered tuple of primitives naming one fetchable unit of data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Vec<KeyPart>);

impl CacheKey {
    pub fn new(root: impl Into<KeyPart>) -> Self {
        Self(vec![root.into()])
    }

    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// First segment; keys of one family hold the same data type.
    pub fn family(&self) -> Option<&KeyPart> {
        self.0.first()
    }

    pub fn starts_with(&self, prefix: &CacheKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", part)?;
        }
        write!(f, "]")
    }
}

/// Selects entries for invalidation or removal.
#[derive(Clone)]
pub enum KeyFilter {
    Exact(CacheKey),
    /// Every key starting with these segments, including the key itself.
    Prefix(CacheKey),
    Predicate(Arc<dyn Fn(&CacheKey) -> bool + Send + Sync>),
}

impl KeyFilter {
    pub fn exact(key: CacheKey) -> Self {
        KeyFilter::Exact(key)
    }

    pub fn prefix(key: CacheKey) -> Self {
        KeyFilter::Prefix(key)
    }

    pub fn matching<F>(predicate: F) -> Self
    where
        F: Fn(&CacheKey) -> bool + Send + Sync + 'static,
    {
        KeyFilter::Predicate(Arc::new(predicate))
    }

    pub fn matches(&self, key: &CacheKey) -> bool {
        match self {
            KeyFilter::Exact(k) => k == key,
            KeyFilter::Prefix(prefix) => key.starts_with(prefix),
            KeyFilter::Predicate(predicate) => predicate(key),
        }
    }
}

impl From<CacheKey> for KeyFilter {
    fn from(key: CacheKey) -> Self {
        KeyFilter::Exact(key)
    }
}

impl fmt::Debug for KeyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyFilter::Exact(key) => write!(f, "Exact({})", key),
            KeyFilter::Prefix(key) => write!(f, "Prefix({})", key),
            KeyFilter::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn display_matches_tuple_notation() {
        let key = CacheKey::new("post").with(PostId(7));
        assert_eq!(key.to_string(), r#"["post", 7]"#);
    }

    #[test]
    fn exact_filter_ignores_longer_keys() {
        let filter = KeyFilter::exact(CacheKey::new("posts"));
        assert!(filter.matches(&CacheKey::new("posts")));
        assert!(!filter.matches(&CacheKey::new("posts").with("cats")));
    }

    #[test]
    fn predicate_filter() {
        let filter = KeyFilter::matching(|key| key.parts().len() == 2);
        assert!(filter.matches(&CacheKey::new("post").with(1i64)));
        assert!(!filter.matches(&CacheKey::new("my-posts")));
    }

    proptest! {
        #[test]
        fn prefix_matches_every_extension(root in "[a-z-]{1,10}", rest in proptest::collection::vec("[a-z]{0,6}", 0..4)) {
            let prefix = CacheKey::new(root.as_str());
            let mut key = prefix.clone();
            for part in &rest {
                key = key.with(part.as_str());
            }
            prop_assert!(KeyFilter::prefix(prefix.clone()).matches(&key));
            prop_assert_eq!(key.family(), prefix.family());
        }

        #[test]
        fn prefix_rejects_other_families(a in "[a-m]{1,8}", b in "[n-z]{1,8}") {
            let filter = KeyFilter::prefix(CacheKey::new(a.as_str()));
            prop_assert!(!filter.matches(&CacheKey::new(b.as_str()).with(a.as_str())));
        }
    }
}
