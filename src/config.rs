//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `RELEVO_MEMORY_PATH` and `RELEVO_LOG_LEVEL` env overrides.
//! The provider API key comes only from the `LLM_API_KEY` env var — never
//! from TOML.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;

/// HTTP adapter configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Socket address to bind the HTTP adapter to.
    pub bind: String,
}

/// OpenAI / OpenAI-compatible provider configuration.
/// Populated from `[llm.openai]` in the TOML.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// Reasoning-provider configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (e.g. `"dummy"`, `"openai"`).
    /// Maps to `default` in `[llm]` TOML.
    pub provider: String,
    /// Config for the OpenAI / OpenAI-compatible provider (`[llm.openai]`).
    pub openai: OpenAiConfig,
}

/// Orchestrator configuration — passed explicitly into the agent at
/// construction time so concurrent invocations with different settings
/// stay isolated.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// `"llm"` for provider-driven planning, `"fixed"` for the
    /// deterministic tool order.
    pub planner: String,
    /// Step budget: each executed tool costs one step.
    pub max_steps: u32,
    /// Follow-up threshold, hours since last update (strict `>`).
    pub followup_hours: f64,
    /// SLA threshold for high-priority escalation, hours (strict `>`).
    pub sla_hours: f64,
    /// Planning-call attempts before falling back to the fixed plan.
    pub planner_attempts: u32,
    /// Base backoff between planning retries, milliseconds (doubles per try).
    pub backoff_ms: u64,
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub service_name: String,
    pub log_level: String,
    /// Site-memory JSON file (already expanded, no `~`).
    pub memory_path: PathBuf,
    pub http: HttpConfig,
    pub agent: AgentConfig,
    pub llm: LlmConfig,
    /// API key from `LLM_API_KEY` env var — `None` for keyless local models.
    pub llm_api_key: Option<String>,
}

// ── Raw TOML shape — `serde` target before resolution ─────────────────────────

#[derive(Deserialize)]
struct RawConfig {
    service: RawService,
    #[serde(default)]
    http: RawHttp,
    #[serde(default)]
    agent: RawAgent,
    #[serde(default)]
    llm: RawLlm,
}

#[derive(Deserialize)]
struct RawService {
    #[serde(default = "default_service_name")]
    name: String,
    #[serde(default = "default_log_level")]
    log_level: String,
    memory_path: String,
}

#[derive(Deserialize)]
struct RawHttp {
    #[serde(default = "default_http_bind")]
    bind: String,
}

impl Default for RawHttp {
    fn default() -> Self {
        Self { bind: default_http_bind() }
    }
}

#[derive(Deserialize)]
struct RawAgent {
    #[serde(default = "default_planner")]
    planner: String,
    #[serde(default = "default_max_steps")]
    max_steps: u32,
    #[serde(default = "default_followup_hours")]
    followup_hours: f64,
    #[serde(default = "default_sla_hours")]
    sla_hours: f64,
    #[serde(default = "default_planner_attempts")]
    planner_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    backoff_ms: u64,
}

impl Default for RawAgent {
    fn default() -> Self {
        Self {
            planner: default_planner(),
            max_steps: default_max_steps(),
            followup_hours: default_followup_hours(),
            sla_hours: default_sla_hours(),
            planner_attempts: default_planner_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), openai: RawOpenAiConfig::default() }
    }
}

#[derive(Deserialize)]
struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default = "default_openai_temperature")]
    temperature: f32,
    #[serde(default = "default_openai_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            timeout_seconds: default_openai_timeout_seconds(),
        }
    }
}

fn default_service_name() -> String { "relevo".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_http_bind() -> String { "127.0.0.1:8080".to_string() }
fn default_planner() -> String { "llm".to_string() }
fn default_max_steps() -> u32 { 10 }
fn default_followup_hours() -> f64 { 8.0 }
fn default_sla_hours() -> f64 { 24.0 }
fn default_planner_attempts() -> u32 { 3 }
fn default_backoff_ms() -> u64 { 250 }
fn default_llm_provider() -> String { "dummy".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
fn default_openai_temperature() -> f32 { 0.2 }
fn default_openai_timeout_seconds() -> u64 { 60 }

/// Load config from `config/default.toml`, then apply env-var overrides.
pub fn load() -> Result<Config, AppError> {
    let memory_override = env::var("RELEVO_MEMORY_PATH").ok();
    let log_level_override = env::var("RELEVO_LOG_LEVEL").ok();
    load_from(
        Path::new("config/default.toml"),
        memory_override.as_deref(),
        log_level_override.as_deref(),
    )
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    memory_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let s = parsed.service;
    let memory_path = expand_home(memory_override.unwrap_or(&s.memory_path));
    let log_level = log_level_override.unwrap_or(&s.log_level).to_string();

    let a = parsed.agent;
    if a.max_steps == 0 {
        return Err(AppError::Config("agent.max_steps must be at least 1".into()));
    }
    if a.followup_hours < 0.0 || a.sla_hours < 0.0 {
        return Err(AppError::Config("thresholds must be non-negative".into()));
    }

    Ok(Config {
        service_name: s.name,
        log_level,
        memory_path,
        http: HttpConfig { bind: parsed.http.bind },
        agent: AgentConfig {
            planner: a.planner,
            max_steps: a.max_steps,
            followup_hours: a.followup_hours,
            sla_hours: a.sla_hours,
            planner_attempts: a.planner_attempts.max(1),
            backoff_ms: a.backoff_ms,
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                temperature: parsed.llm.openai.temperature,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
        },
        llm_api_key: env::var("LLM_API_KEY").ok(),
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

impl Config {
    /// Safe `Config` for tests — dummy provider, fixed planner, no
    /// external calls.
    pub fn test_default(memory_path: &Path) -> Self {
        Self {
            service_name: "test".into(),
            log_level: "info".into(),
            memory_path: memory_path.to_path_buf(),
            http: HttpConfig { bind: default_http_bind() },
            agent: AgentConfig {
                planner: "fixed".into(),
                max_steps: 10,
                followup_hours: 8.0,
                sla_hours: 24.0,
                planner_attempts: 2,
                backoff_ms: 1,
            },
            llm: LlmConfig {
                provider: "dummy".into(),
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                },
            },
            llm_api_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_TOML: &str = r#"
[service]
memory_path = "~/.relevo/memory.json"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_minimal_config_with_defaults() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.service_name, "relevo");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.agent.max_steps, 10);
        assert_eq!(cfg.agent.followup_hours, 8.0);
        assert_eq!(cfg.agent.sla_hours, 24.0);
        assert_eq!(cfg.llm.provider, "dummy");
    }

    #[test]
    fn full_sections_parse() {
        let f = write_toml(
            r#"
[service]
name = "relevo-test"
log_level = "debug"
memory_path = "/tmp/mem.json"

[http]
bind = "0.0.0.0:9999"

[agent]
planner = "fixed"
max_steps = 3
followup_hours = 4.5
sla_hours = 12.0

[llm]
default = "openai"

[llm.openai]
model = "gpt-4o"
"#,
        );
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.http.bind, "0.0.0.0:9999");
        assert_eq!(cfg.agent.planner, "fixed");
        assert_eq!(cfg.agent.max_steps, 3);
        assert_eq!(cfg.agent.followup_hours, 4.5);
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.openai.model, "gpt-4o");
    }

    #[test]
    fn overrides_win() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), Some("/tmp/override.json"), Some("trace")).unwrap();
        assert_eq!(cfg.memory_path, PathBuf::from("/tmp/override.json"));
        assert_eq!(cfg.log_level, "trace");
    }

    #[test]
    fn zero_max_steps_rejected() {
        let f = write_toml(
            r#"
[service]
memory_path = "/tmp/mem.json"

[agent]
max_steps = 0
"#,
        );
        assert!(load_from(f.path(), None, None).is_err());
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), None, None);
        assert!(result.unwrap_err().to_string().contains("config error"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/.relevo");
        assert!(expanded.starts_with(&home));
    }
}
