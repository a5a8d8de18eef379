//! Model and credential configuration.
//!
//! Sessions inherit the operator's Bedrock/model settings. Values are
//! resolved once per invocation from `~/.claude/settings.json`, with the
//! process environment taking precedence whenever the settings file is
//! absent or a field is empty. Resolution is injected into the command
//! builder so nothing reads globals at build time.

use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::Value;

/// Default AWS region when neither settings nor environment name one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Resolved model/credential configuration, read-only after load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelConfig {
    /// Non-empty when Bedrock is the credential mode.
    pub bedrock_enabled: Option<String>,
    /// AWS region, always present.
    pub aws_region: String,
    /// AWS profile, when configured.
    pub aws_profile: Option<String>,
    /// Model override, when configured.
    pub model: Option<String>,
}

impl ModelConfig {
    /// Loads configuration from the settings file and process environment.
    pub fn load() -> Self {
        let settings = settings_path().and_then(|p| read_settings(&p));
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::from_sources(settings.as_ref(), &env)
    }

    /// Resolves configuration from explicit sources. Settings values win
    /// unless absent or empty, in which case the environment applies.
    pub fn from_sources(settings: Option<&Value>, env: &HashMap<String, String>) -> Self {
        let settings_env = settings.and_then(|s| s.get("env"));

        let lookup = |key: &str| -> Option<String> {
            settings_env
                .and_then(|e| e.get(key))
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .or_else(|| env.get(key).filter(|v| !v.is_empty()).cloned())
        };

        // An apiProvider of "bedrock" counts as enabling Bedrock even
        // when the env table does not set the flag explicitly.
        let provider_fallback = settings
            .and_then(|s| s.get("apiProvider"))
            .and_then(Value::as_str)
            .filter(|p| *p == "bedrock")
            .map(|_| "1".to_string());

        Self {
            bedrock_enabled: lookup("CLAUDE_CODE_USE_BEDROCK").or(provider_fallback),
            aws_region: lookup("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            aws_profile: lookup("AWS_PROFILE"),
            model: lookup("ANTHROPIC_MODEL"),
        }
    }

    /// Environment variables to inject into a session, in a stable order.
    pub fn env_vars(&self) -> Vec<(&'static str, String)> {
        let mut vars = Vec::new();
        if let Some(enabled) = &self.bedrock_enabled {
            vars.push(("CLAUDE_CODE_USE_BEDROCK", enabled.clone()));
        }
        vars.push(("AWS_REGION", self.aws_region.clone()));
        if let Some(profile) = &self.aws_profile {
            vars.push(("AWS_PROFILE", profile.clone()));
        }
        if let Some(model) = &self.model {
            vars.push(("ANTHROPIC_MODEL", model.clone()));
        }
        vars
    }
}

fn settings_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".claude").join("settings.json"))
}

/// Reads and parses the settings file, returning None on any failure.
fn read_settings(path: &std::path::Path) -> Option<Value> {
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}
