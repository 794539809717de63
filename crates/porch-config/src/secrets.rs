//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (e.g. `"GEMINI_API_KEY"`).
//! - At startup the daemon calls [`resolve_secrets`] once and passes the
//!   result into constructors; never scatter `std::env::var` calls.
//! - `Debug` on secret-containing structs **redacts** values.
//! - Error messages reference the env var **NAME**, never the value.
//!
//! The extraction key is optional: a daemon without it still serves the
//! delivery session, and the extraction route answers 500 (not configured).

use crate::DaemonConfig;

/// All runtime-resolved secrets for one daemon instance.
/// **Values are redacted in `Debug` output.**
#[derive(Clone, Default)]
pub struct ResolvedSecrets {
    /// Extraction-service API key. `None` if the named env var was absent or empty.
    pub extraction_api_key: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "extraction_api_key",
                &self.extraction_api_key.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

/// Resolve secrets from the process environment.
pub fn resolve_secrets(cfg: &DaemonConfig) -> ResolvedSecrets {
    resolve_secrets_with(cfg, |name| std::env::var(name).ok())
}

/// Resolve secrets through an arbitrary lookup (tests inject a map here).
pub fn resolve_secrets_with<F>(cfg: &DaemonConfig, lookup: F) -> ResolvedSecrets
where
    F: Fn(&str) -> Option<String>,
{
    let extraction_api_key = lookup(cfg.extraction.api_key_env.trim())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    ResolvedSecrets { extraction_api_key }
}
