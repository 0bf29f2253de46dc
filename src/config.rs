//! Narrative configuration: credential, model and endpoint.
//!
//! Values come from the environment (after `.env` is loaded by the binary)
//! and explicit user input overrides them.

use crate::narrative::{DemoNarrator, NarrativeGenerator, OpenAiNarrator};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const MODEL_ENV: &str = "OPENAI_MODEL";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Clone, Serialize, Deserialize)]
pub struct NarrativeConfig {
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Serve canned insights instead of calling the model
    pub demo_mode: bool,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            demo_mode: false,
        }
    }
}

impl NarrativeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; blank values are ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            api_key: get(API_KEY_ENV),
            model: get(MODEL_ENV).unwrap_or(defaults.model),
            base_url: get(BASE_URL_ENV).unwrap_or(defaults.base_url),
            demo_mode: false,
        }
    }

    /// An explicitly supplied key replaces the environment default.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
        self
    }

    pub fn with_demo_mode(mut self, demo_mode: bool) -> Self {
        self.demo_mode = demo_mode;
        self
    }

    /// The generator to use, or `None` when neither demo mode nor a key is
    /// available.
    pub fn narrator(&self) -> Option<Box<dyn NarrativeGenerator>> {
        if self.demo_mode {
            return Some(Box::new(DemoNarrator));
        }
        self.api_key.as_ref().map(|key| {
            Box::new(OpenAiNarrator::new(
                key.clone(),
                self.model.clone(),
                self.base_url.clone(),
            )) as Box<dyn NarrativeGenerator>
        })
    }
}

impl fmt::Debug for NarrativeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NarrativeConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("demo_mode", &self.demo_mode)
            .finish()
    }
}
