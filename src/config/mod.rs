use crate::error::PromptGateError;
use crate::ratelimit::RateLimitConfig;
use crate::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 主配置结构
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub provider_list: Vec<ProviderConfig>,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// 提示词最大字符数（不设置则不限制）
    #[serde(default)]
    pub max_prompt_chars: Option<usize>,
    /// 单次上游调用超时（毫秒）
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// CORS 允许的来源
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

/// 提供商配置，按列表顺序依次回退
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// 对外暴露的模型标识（响应中的 model 字段）
    pub name: String,
    pub params: ProviderParams,
}

/// 提供商调用参数
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderParams {
    pub model: String, // 格式: provider/model-id
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// 固定的系统指令，调用时附加在提示词前
    #[serde(default)]
    pub system_instruction: Option<String>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_api_base() -> String {
    String::new()
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Config {
    /// 从 YAML 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let content = Self::replace_env_vars(&content)?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// 替换配置中的环境变量 ${VAR}
    fn replace_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
        let mut result = content.to_string();

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name).map_err(|_| {
                PromptGateError::config(format!("环境变量未找到: {}", var_name))
            })?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// 验证配置
    fn validate(&self) -> Result<()> {
        if self.provider_list.is_empty() {
            return Err(PromptGateError::config("provider_list 不能为空"));
        }

        for provider in &self.provider_list {
            if provider.name.is_empty() {
                return Err(PromptGateError::config("name 不能为空"));
            }
            let (kind, _) = parse_model_string(&provider.params.model)?;
            // canned 提供商在本地生成回复，不需要 API 密钥
            if kind != "canned" && provider.params.api_key.is_empty() {
                return Err(PromptGateError::config(format!(
                    "提供商 {} 缺少 api_key",
                    provider.name
                )));
            }
        }

        if self.rate_limit.max_requests == 0 {
            return Err(PromptGateError::config("max_requests 必须大于 0"));
        }
        if self.rate_limit.window_ms == 0 {
            return Err(PromptGateError::config("window_ms 必须大于 0"));
        }

        Ok(())
    }

    /// 链条中的第一个提供商（health 端点对外展示用）
    pub fn first_provider(&self) -> &ProviderConfig {
        // validate() 保证 provider_list 非空
        &self.provider_list[0]
    }
}

/// 解析模型字符串 (provider/model-id)
pub fn parse_model_string(model: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = model.split('/').collect();
    if parts.len() != 2 {
        return Err(PromptGateError::InvalidModelString(format!(
            "期望格式 'provider/model-id'，得到: {}",
            model
        )));
    }

    let provider = parts[0].to_string();
    let model_id = parts[1].to_string();

    if provider.is_empty() || model_id.is_empty() {
        return Err(PromptGateError::InvalidModelString(format!(
            "提供商和模型 ID 不能为空: {}",
            model
        )));
    }

    Ok((provider, model_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_model_string_valid() {
        let (provider, model_id) = parse_model_string("gemini/gemini-1.0-pro").unwrap();
        assert_eq!(provider, "gemini");
        assert_eq!(model_id, "gemini-1.0-pro");

        let (provider, model_id) = parse_model_string("openai/gpt-4").unwrap();
        assert_eq!(provider, "openai");
        assert_eq!(model_id, "gpt-4");

        let (provider, model_id) = parse_model_string("canned/github-ai-v1").unwrap();
        assert_eq!(provider, "canned");
        assert_eq!(model_id, "github-ai-v1");
    }

    #[test]
    fn test_parse_model_string_invalid() {
        assert!(parse_model_string("invalid").is_err());
        assert!(parse_model_string("too/many/parts").is_err());
        assert!(parse_model_string("/empty-provider").is_err());
        assert!(parse_model_string("empty-model/").is_err());
    }

    #[test]
    fn test_config_from_valid_yaml() {
        let yaml = r#"
provider_list:
  - name: gemini-1.0-pro
    params:
      model: gemini/gemini-1.0-pro
      api_key: AIza-test-key
  - name: gemini-pro
    params:
      model: gemini/gemini-pro
      api_key: AIza-test-key
      api_base: https://generativelanguage.googleapis.com
"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.provider_list.len(), 2);
        assert_eq!(config.provider_list[0].name, "gemini-1.0-pro");
        assert_eq!(config.provider_list[0].params.api_base, ""); // 默认值
        assert_eq!(
            config.provider_list[1].params.api_base,
            "https://generativelanguage.googleapis.com"
        );
        // 未配置时使用默认限流预设
        assert_eq!(config.rate_limit.max_requests, 60);
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert_eq!(config.request_timeout_ms, 60_000);
        assert_eq!(config.cors_origin, "*");
        assert_eq!(config.max_prompt_chars, None);
    }

    #[test]
    fn test_config_with_rate_limit_preset() {
        let yaml = r#"
provider_list:
  - name: canned
    params:
      model: canned/github-ai-v1
rate_limit:
  max_requests: 100
  window_ms: 900000
max_prompt_chars: 500
"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.rate_limit.window_ms, 900_000);
        assert_eq!(config.max_prompt_chars, Some(500));
    }

    #[test]
    fn test_config_with_env_vars() {
        env::set_var("TEST_GEMINI_KEY", "AIza-from-env");

        let yaml = r#"
provider_list:
  - name: gemini
    params:
      model: gemini/gemini-pro
      api_key: ${TEST_GEMINI_KEY}
"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.provider_list[0].params.api_key, "AIza-from-env");

        env::remove_var("TEST_GEMINI_KEY");
    }

    #[test]
    fn test_config_missing_env_var() {
        let yaml = r#"
provider_list:
  - name: gemini
    params:
      model: gemini/gemini-pro
      api_key: ${MISSING_VAR}
"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let result = Config::from_file(file.path());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("MISSING_VAR"));
    }

    #[test]
    fn test_config_validation_empty_provider_list() {
        let yaml = r#"
provider_list: []
"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let result = Config::from_file(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validation_missing_api_key() {
        let yaml = r#"
provider_list:
  - name: gemini
    params:
      model: gemini/gemini-pro
"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let result = Config::from_file(file.path());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("api_key"));
    }

    #[test]
    fn test_config_canned_provider_without_api_key() {
        let yaml = r#"
provider_list:
  - name: github-ai-v1
    params:
      model: canned/github-ai-v1
"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        // canned 提供商无需密钥
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.provider_list[0].params.api_key, "");
    }
}
