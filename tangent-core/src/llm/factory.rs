//! Provider construction and credential lookup.

use std::env;
use std::sync::Arc;

use super::error::ProviderError;
use super::generator::ContentGenerator;
use super::providers::OpenAiCompatProvider;

const MOONSHOT_BASE_URL: &str = "https://api.moonshot.ai/v1";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Environment variable holding the credential for a provider. The name is
/// fixed per provider; the value is opaque to the core.
pub fn api_key_env_var(provider: &str) -> Option<&'static str> {
    match provider {
        "moonshot" | "kimi" => Some("MOONSHOT_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        _ => None,
    }
}

fn read_api_key(provider: &str) -> Result<String, ProviderError> {
    let var = api_key_env_var(provider).ok_or_else(|| {
        ProviderError::InvalidRequest(format!("unknown provider '{provider}'"))
    })?;
    env::var(var).map_err(|_| {
        ProviderError::Authentication(format!(
            "missing API key: set the {var} environment variable"
        ))
    })
}

/// Build a content generator for the named provider.
///
/// `base_url` overrides the provider default, which lets any
/// OpenAI-compatible endpoint be reached through the same client.
pub fn create_generator(
    provider: &str,
    base_url: Option<String>,
) -> Result<Arc<dyn ContentGenerator>, ProviderError> {
    let api_key = read_api_key(provider)?;
    let default_base = match provider {
        "moonshot" | "kimi" => MOONSHOT_BASE_URL,
        "openai" => OPENAI_BASE_URL,
        _ => {
            return Err(ProviderError::InvalidRequest(format!(
                "unknown provider '{provider}'"
            )));
        }
    };
    Ok(Arc::new(OpenAiCompatProvider::new(
        provider.to_string(),
        api_key,
        base_url.unwrap_or_else(|| default_base.to_string()),
    )))
}
