//! Backend key layout.
//!
//! ```text
//! <scope>:ns:<id>               sealed namespace hash
//! <scope>:mk:<id>               sealed master key
//! <scope>:v:<id>:<logical_key>  encrypted value (base64)
//! <scope>:p:<id>:<logical_key>  plaintext value (JSON)
//! ```

/// Builds backend keys for one storage scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyLayout {
    scope: String,
}

impl KeyLayout {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn scope_prefix(&self) -> String {
        format!("{}:", self.scope)
    }

    pub fn namespace_prefix(&self) -> String {
        format!("{}:ns:", self.scope)
    }

    pub fn namespace_record(&self, id: &str) -> String {
        format!("{}:ns:{id}", self.scope)
    }

    pub fn master_key_record(&self, id: &str) -> String {
        format!("{}:mk:{id}", self.scope)
    }

    pub fn value_prefix(&self, id: &str) -> String {
        format!("{}:v:{id}:", self.scope)
    }

    pub fn value(&self, id: &str, logical_key: &str) -> String {
        format!("{}:v:{id}:{logical_key}", self.scope)
    }

    pub fn plain_prefix(&self, id: &str) -> String {
        format!("{}:p:{id}:", self.scope)
    }

    pub fn plain(&self, id: &str, logical_key: &str) -> String {
        format!("{}:p:{id}:{logical_key}", self.scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_share_scope_prefix() {
        let layout = KeyLayout::new("session");
        let prefix = layout.scope_prefix();
        for key in [
            layout.namespace_record("AbCd1234"),
            layout.master_key_record("AbCd1234"),
            layout.value("AbCd1234", "apiKey"),
            layout.plain("AbCd1234", "label"),
        ] {
            assert!(key.starts_with(&prefix), "{key}");
        }
    }

    #[test]
    fn value_key_is_under_value_prefix() {
        let layout = KeyLayout::new("abc");
        assert_eq!(layout.value("id", "apiKey"), "abc:v:id:apiKey");
        assert!(layout.value("id", "apiKey").starts_with(&layout.value_prefix("id")));
        assert!(!layout.value("id2", "k").starts_with(&layout.value_prefix("id")));
    }
}
