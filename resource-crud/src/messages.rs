//! User-facing message templates and per-resource vocabularies
//!
//! A [`MessageRegistry`] is built once at startup and shared with every
//! controller. Each controller owns a [`Vocabulary`]; resolving a message key
//! merges that vocabulary over the registry's base vocabulary, picks the
//! template and fills its `{word}` placeholders from the merged mapping.
//!
//! # Example
//!
//! ```rust,ignore
//! use resource_crud::messages::{keys, MessageRegistry, Vocabulary};
//!
//! let registry = MessageRegistry::crud_defaults();
//! let users = Vocabulary::new().with("resource", "User");
//! assert_eq!(registry.get_message(keys::NOT_FOUND, &users), "User not found");
//!
//! let orders = Vocabulary::new().with(keys::NOT_FOUND, "No such order");
//! assert_eq!(registry.get_message(keys::NOT_FOUND, &orders), "No such order");
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::MessagesConfig;

/// Built-in message keys used by the controller
pub mod keys {
    /// Target record is absent
    pub const NOT_FOUND: &str = "NOT_FOUND";
    /// Hard delete refused
    pub const OPERATION_NOT_ALLOWED: &str = "OPERATION_NOT_ALLOWED";
    /// Delete succeeded
    pub const DELETE_SUCCESS: &str = "DELETE_SUCCESS";
}

/// Placeholder filled with the resource display name by the built-in templates
pub const RESOURCE_WORD: &str = "resource";

/// Mapping from message key or placeholder word to display text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vocabulary(BTreeMap<String, String>);

impl Vocabulary {
    /// Empty vocabulary
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Add or replace an entry in place
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up an entry
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// `parent` with this vocabulary's entries winning per key
    pub fn merged_over(&self, parent: &Vocabulary) -> Vocabulary {
        let mut merged = parent.0.clone();
        merged.extend(self.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Vocabulary(merged)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, String>> for Vocabulary {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Vocabulary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Message templates, base vocabulary and fallback text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRegistry {
    templates: BTreeMap<String, String>,
    vocabulary: Vocabulary,
    fallback: String,
}

impl MessageRegistry {
    /// Registry with no templates
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            templates: BTreeMap::new(),
            vocabulary: Vocabulary::new(),
            fallback: fallback.into(),
        }
    }

    /// Registry preloaded with the controller's messages
    pub fn crud_defaults() -> Self {
        let mut registry = Self::new(MessagesConfig::default().fallback);
        registry.load(
            [
                (keys::NOT_FOUND, "{resource} not found"),
                (keys::OPERATION_NOT_ALLOWED, "Operation not allowed on {resource}"),
                (keys::DELETE_SUCCESS, "{resource} deleted"),
            ],
            [(RESOURCE_WORD, "Record")],
        );
        registry
    }

    /// Controller messages overlaid with configured templates and vocabulary
    pub fn from_config(config: &MessagesConfig) -> Self {
        let mut registry = Self::crud_defaults();
        registry.fallback = config.fallback.clone();
        registry.load(config.templates.clone(), config.vocabulary.clone());
        registry
    }

    /// Merge templates and base vocabulary entries into the registry
    pub fn load<T, V, K1, S1, K2, S2>(&mut self, templates: T, vocabulary: V)
    where
        T: IntoIterator<Item = (K1, S1)>,
        V: IntoIterator<Item = (K2, S2)>,
        K1: Into<String>,
        S1: Into<String>,
        K2: Into<String>,
        S2: Into<String>,
    {
        self.templates
            .extend(templates.into_iter().map(|(k, v)| (k.into(), v.into())));
        for (key, value) in vocabulary {
            self.vocabulary.insert(key, value);
        }
    }

    /// Base vocabulary
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Text used for unknown keys
    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Resolve `key` against `vocabulary` merged over the base vocabulary
    ///
    /// The merged vocabulary may override a key outright; otherwise the
    /// registered template is used, and the fallback text when neither
    /// exists. Placeholders with no vocabulary entry are kept verbatim.
    pub fn get_message(&self, key: &str, vocabulary: &Vocabulary) -> String {
        let effective = vocabulary.merged_over(&self.vocabulary);
        let template = effective
            .get(key)
            .or_else(|| self.templates.get(key).map(String::as_str))
            .unwrap_or(&self.fallback);
        render(template, &effective)
    }
}

impl Default for MessageRegistry {
    fn default() -> Self {
        Self::crud_defaults()
    }
}

fn render(template: &str, vocabulary: &Vocabulary) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let word = &after[..close];
                match vocabulary.get(word).filter(|_| is_word(word)) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(word);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}
