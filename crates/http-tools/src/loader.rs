//! Configuration source resolution.
//!
//! The loader picks a source (inline JSON first, then a reference), substitutes `${VAR}`
//! placeholders in every string leaf, and hands the result to [`crate::validate`].

use crate::config::ApiConfig;
use crate::error::ConfigError;
use crate::safety::OutboundHttpSafety;
use crate::validate::validate_with_safety;
use regex::{Captures, Regex};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

/// Inline JSON configuration.
pub const API_CONFIG_ENV: &str = "TOOLGATE_API_CONFIG";
/// Config-by-reference (reserved; no resolver ships yet).
pub const API_CONFIG_REF_ENV: &str = "TOOLGATE_API_CONFIG_REF";

static ENV_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env placeholder regex")
});

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

#[derive(Clone)]
pub struct ConfigLoader {
    inline: Option<String>,
    reference: Option<String>,
    env: EnvLookup,
    safety: OutboundHttpSafety,
}

impl fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Inline JSON may contain credentials; only report presence.
        f.debug_struct("ConfigLoader")
            .field("inline", &self.inline.is_some())
            .field("reference", &self.reference)
            .field("safety", &self.safety)
            .finish_non_exhaustive()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            inline: None,
            reference: None,
            env: Arc::new(|name| std::env::var(name).ok()),
            safety: OutboundHttpSafety::strict(),
        }
    }
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

impl ConfigLoader {
    /// Loader reading both sources from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let loader = Self::default();
        let inline = non_blank((loader.env)(API_CONFIG_ENV));
        let reference = non_blank((loader.env)(API_CONFIG_REF_ENV));
        Self {
            inline,
            reference,
            ..loader
        }
    }

    /// Use `json` as the inline source, replacing any inline source from the environment.
    #[must_use]
    pub fn with_inline(mut self, json: impl Into<String>) -> Self {
        self.inline = non_blank(Some(json.into()));
        self
    }

    /// Read `path` and use its contents as the inline source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadFile`] if the file cannot be read.
    pub fn with_file(self, path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        Ok(self.with_inline(text))
    }

    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = non_blank(Some(reference.into()));
        self
    }

    /// Replace the variable lookup used for `${VAR}` substitution.
    #[must_use]
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(lookup);
        self
    }

    #[must_use]
    pub fn with_safety(mut self, safety: OutboundHttpSafety) -> Self {
        self.safety = safety;
        self
    }

    /// Resolve the source and substitute placeholders, without validating.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if no source is set, the reference source is used, the JSON is
    /// malformed or a placeholder names an unset variable.
    pub fn resolve(&self) -> Result<Value, ConfigError> {
        if let Some(inline) = &self.inline {
            debug!(bytes = inline.len(), "resolving inline API config");
            let raw: Value = serde_json::from_str(inline)?;
            return substitute_env(raw, &*self.env);
        }
        if let Some(reference) = &self.reference {
            return Err(ConfigError::ReferenceUnsupported {
                reference: reference.clone(),
            });
        }
        Err(ConfigError::NoSource {
            inline_var: API_CONFIG_ENV,
            reference_var: API_CONFIG_REF_ENV,
        })
    }

    /// Resolve, substitute and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for source failures, or [`ConfigError::Validation`] wrapping the
    /// first violated validation rule.
    pub fn load(&self) -> Result<ApiConfig, ConfigError> {
        let raw = self.resolve()?;
        let config = validate_with_safety(&raw, &self.safety)?;
        info!(
            apis = config.apis.len(),
            tools = config.tool_count(),
            "API config loaded"
        );
        Ok(config)
    }
}

/// Replace every `${NAME}` in every string leaf of `value` using `lookup`.
///
/// Object keys are left untouched. The first unset variable aborts substitution.
///
/// # Errors
///
/// Returns [`ConfigError::UnresolvedPlaceholder`] naming the unset variable.
pub fn substitute_env<F>(value: Value, lookup: &F) -> Result<Value, ConfigError>
where
    F: Fn(&str) -> Option<String> + ?Sized,
{
    match value {
        Value::String(s) => substitute_str(&s, lookup).map(Value::String),
        Value::Array(items) => items
            .into_iter()
            .map(|v| substitute_env(v, lookup))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| substitute_env(v, lookup).map(|v| (k, v)))
            .collect::<Result<serde_json::Map<_, _>, _>>()
            .map(Value::Object),
        other => Ok(other),
    }
}

fn substitute_str<F>(s: &str, lookup: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String> + ?Sized,
{
    let mut missing: Option<String> = None;
    let out = ENV_PLACEHOLDER.replace_all(s, |caps: &Captures<'_>| {
        let name = &caps[1];
        if let Some(v) = lookup(name) {
            v
        } else {
            missing.get_or_insert_with(|| name.to_string());
            String::new()
        }
    });
    match missing {
        Some(name) => Err(ConfigError::UnresolvedPlaceholder { name }),
        None => Ok(out.into_owned()),
    }
}
