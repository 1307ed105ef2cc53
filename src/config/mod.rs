// Configuration manager module
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::LoadTestError;

/// ログ出力形式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Text
    }
}

/// 同時ユーザ数の既定上限
pub const DEFAULT_MAX_USERS: u64 = 10_000;

/// メイン設定構造体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_host: String,
    pub listen_port: u16,
    pub llm_endpoint: String,
    pub llm_api_key_env: String,
    pub target_url: Option<String>,
    pub request_timeout: u64,
    pub max_users: u64,
    pub prompts_file: Option<String>,
    pub shutdown_timeout: u64,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_host: "127.0.0.1".to_string(),
            listen_port: 8000,
            llm_endpoint: String::new(),
            llm_api_key_env: "LLM_API_KEY".to_string(),
            target_url: None,
            request_timeout: 10,
            max_users: DEFAULT_MAX_USERS,
            prompts_file: None,
            shutdown_timeout: 5,
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    /// 設定値の検証。違反ごとにメッセージを集めて返す。
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.listen_host.is_empty() {
            errors.push("listen_host must not be empty".to_string());
        }
        if self.listen_port == 0 {
            errors.push("listen_port must be greater than 0".to_string());
        }
        if self.request_timeout == 0 {
            errors.push("request_timeout must be greater than 0".to_string());
        }
        if self.max_users == 0 {
            errors.push("max_users must be greater than 0".to_string());
        }
        if self.shutdown_timeout == 0 {
            errors.push("shutdown_timeout must be greater than 0".to_string());
        }
        if let Some(ref url) = self.target_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                errors.push("target_url must be an http(s) URL".to_string());
            }
        }
        if !self.llm_endpoint.is_empty()
            && !self.llm_endpoint.starts_with("http://")
            && !self.llm_endpoint.starts_with("https://")
        {
            errors.push("llm_endpoint must be an http(s) URL".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// 負荷試験対象URL。未設定時は自サーバのチャットエンドポイントを返す。
    pub fn resolved_target_url(&self) -> String {
        match &self.target_url {
            Some(url) => url.clone(),
            None => format!("http://{}:{}/api/chat", self.listen_host, self.listen_port),
        }
    }
}

/// JSON文字列から設定を読み込み、バリデーションを実行する
pub fn load_from_str(json: &str) -> Result<Config, LoadTestError> {
    let config: Config = serde_json::from_str(json)
        .map_err(|e| LoadTestError::ConfigError(format!("JSON parse error: {}", e)))?;

    config.validate().map_err(|errors| {
        LoadTestError::ConfigError(format!("Validation errors: {}", errors.join("; ")))
    })?;

    Ok(config)
}

/// JSONファイルから設定を読み込み、バリデーションを実行する
pub fn load_from_file(path: &Path) -> Result<Config, LoadTestError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        LoadTestError::ConfigError(format!("Failed to read config file '{}': {}", path.display(), e))
    })?;
    load_from_str(&content)
}
