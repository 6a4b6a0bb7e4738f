use anyhow::Result;

pub const DEFAULT_BASE_URL: &str = "https://api.moonshot.ai/v1";

/// Fast model for metadata/client extraction, smart model for tool-driven
/// article synthesis. Both currently resolve to the same backend model.
pub const MODEL_FAST: &str = "kimi-k2.5";
pub const MODEL_SMART: &str = "kimi-k2.5";

#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub company: CompanyContext,
}

/// Optional facts about the organization running the extraction, injected
/// into prompts so the model can tell "us" apart from clients and vendors.
#[derive(Clone, Default)]
pub struct CompanyContext {
    pub name: String,
    pub former_name: String,
    pub business: String,
    pub industries: String,
}

impl Config {
    /// Read settings from the environment. `dotenvy::dotenv()` should have
    /// run first so a local `.env` file is honored.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("MOONSHOT_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "MOONSHOT_API_KEY environment variable is not set. \
                     Set it with: export MOONSHOT_API_KEY=your_api_key"
                )
            })?;

        let base_url =
            std::env::var("MOONSHOT_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            api_key,
            base_url,
            company: CompanyContext::from_env(),
        })
    }
}

impl CompanyContext {
    fn from_env() -> Self {
        let get = |key: &str| std::env::var(key).unwrap_or_default();
        Self {
            name: get("COMPANY_NAME"),
            former_name: get("COMPANY_FORMER_NAME"),
            business: get("COMPANY_BUSINESS"),
            industries: get("COMPANY_INDUSTRIES"),
        }
    }

    /// Render the context preamble for prompts; empty when nothing is set.
    pub fn preamble(&self) -> String {
        let mut parts = Vec::new();

        if !self.name.is_empty() {
            parts.push(format!("COMPANY: {}", self.name));
            if !self.former_name.is_empty() {
                parts.push(format!("  (formerly {})", self.former_name));
            }
        }
        if !self.business.is_empty() {
            parts.push(format!("BUSINESS: {}", self.business));
        }
        if !self.industries.is_empty() {
            parts.push(format!("INDUSTRIES: {}", self.industries));
        }

        if parts.is_empty() {
            String::new()
        } else {
            format!("COMPANY CONTEXT:\n{}\n\n", parts.join("\n"))
        }
    }

    /// How prompts refer to the organization when no name is configured.
    pub fn name_or_us(&self) -> &str {
        if self.name.is_empty() { "us" } else { &self.name }
    }
}
