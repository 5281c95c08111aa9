//! Document identity: key generation and id ↔ store-key mapping.

use std::fmt;
use std::sync::Arc;

/// Produces a statistically unique id when the caller supplies none.
pub trait KeyGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random v4 UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidKeyGenerator;

impl KeyGenerator for UuidKeyGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Custom mapping between a document id and its store key.
pub trait KeyBuilder: Send + Sync {
    fn build(&self, model: &str, id: &str) -> String;

    /// Recover the id from a store key. `None` keeps the whole key as the id.
    fn parse(&self, model: &str, key: &str) -> Option<String>;
}

/// How a model turns ids into store keys.
#[derive(Clone, Default)]
pub enum KeyStrategy {
    /// `<Model><delimiter><id>`, with the registry's delimiter.
    #[default]
    ModelPrefix,
    /// `<prefix><id><suffix>`.
    Affix { prefix: String, suffix: String },
    Custom(Arc<dyn KeyBuilder>),
}

impl fmt::Debug for KeyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyStrategy::ModelPrefix => f.write_str("ModelPrefix"),
            KeyStrategy::Affix { prefix, suffix } => f
                .debug_struct("Affix")
                .field("prefix", prefix)
                .field("suffix", suffix)
                .finish(),
            KeyStrategy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl KeyStrategy {
    /// Fix the strategy for `model`, turning `ModelPrefix` into its affix.
    pub(crate) fn resolve(self, model: &str, delimiter: &str) -> KeyFormat {
        match self {
            KeyStrategy::ModelPrefix => KeyFormat::Affix {
                prefix: format!("{model}{delimiter}"),
                suffix: String::new(),
            },
            KeyStrategy::Affix { prefix, suffix } => KeyFormat::Affix { prefix, suffix },
            KeyStrategy::Custom(builder) => KeyFormat::Custom(builder),
        }
    }
}

/// A registered model's concrete key mapping.
#[derive(Clone)]
pub(crate) enum KeyFormat {
    Affix { prefix: String, suffix: String },
    Custom(Arc<dyn KeyBuilder>),
}

impl fmt::Debug for KeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyFormat::Affix { prefix, suffix } => write!(f, "{prefix:?}<id>{suffix:?}"),
            KeyFormat::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl KeyFormat {
    pub(crate) fn build(&self, model: &str, id: &str) -> String {
        match self {
            KeyFormat::Affix { prefix, suffix } => format!("{prefix}{id}{suffix}"),
            KeyFormat::Custom(builder) => builder.build(model, id),
        }
    }

    pub(crate) fn parse(&self, model: &str, key: &str) -> String {
        let parsed = match self {
            KeyFormat::Affix { prefix, suffix } => key
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_suffix(suffix.as_str()))
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            KeyFormat::Custom(builder) => builder.parse(model, key),
        };
        parsed.unwrap_or_else(|| key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Reversed;

    impl KeyBuilder for Reversed {
        fn build(&self, model: &str, id: &str) -> String {
            format!("{id}@{}", model.to_lowercase())
        }

        fn parse(&self, _model: &str, key: &str) -> Option<String> {
            key.split_once('@').map(|(id, _)| id.to_string())
        }
    }

    #[test]
    fn model_prefix_resolves_with_delimiter() {
        let strategy = KeyStrategy::ModelPrefix.resolve("User", "|");
        assert_eq!(strategy.build("User", "42"), "User|42");
        assert_eq!(strategy.parse("User", "User|42"), "42");
    }

    #[test]
    fn unparseable_key_is_kept_whole() {
        let strategy = KeyStrategy::ModelPrefix.resolve("User", "::");
        assert_eq!(strategy.parse("User", "legacy-key"), "legacy-key");
    }

    #[test]
    fn custom_builder_round_trips() {
        let strategy = KeyStrategy::Custom(Arc::new(Reversed)).resolve("Post", "::");
        let key = strategy.build("Post", "abc");
        assert_eq!(key, "abc@post");
        assert_eq!(strategy.parse("Post", &key), "abc");
    }

    #[test]
    fn affix_keeps_its_own_delimiter() {
        let strategy = KeyStrategy::Affix {
            prefix: "post:".to_string(),
            suffix: ":v1".to_string(),
        }
        .resolve("Post", "|");
        assert_eq!(strategy.build("Post", "7"), "post:7:v1");
        assert_eq!(strategy.parse("Post", "post:7:v1"), "7");
        assert_eq!(strategy.parse("Post", "post::v1"), "post::v1");
    }

    #[test]
    fn generated_ids_are_unique() {
        let generator = UuidKeyGenerator;
        assert_ne!(generator.generate(), generator.generate());
    }
}
