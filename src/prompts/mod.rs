use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::LoadTestError;

/// 既定の代表プロンプト（prompts_file未設定時に使用）
pub const DEFAULT_PROMPT: &str = "Hello! Please give me a short status update.";

/// prompts.jsonのルート構造
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptsFile {
    pub prompts: Vec<String>,
}

/// プロンプト選択戦略
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionStrategy {
    RoundRobin,
    Random,
}

/// 仮想ユーザが送信するチャットペイロードのプール（共有リソース）
pub struct PromptPool {
    prompts: Vec<String>,
    index: AtomicUsize,
}

impl std::fmt::Debug for PromptPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptPool")
            .field("prompts", &self.prompts)
            .field("index", &self.index.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for PromptPool {
    fn default() -> Self {
        Self {
            prompts: vec![DEFAULT_PROMPT.to_string()],
            index: AtomicUsize::new(0),
        }
    }
}

impl PromptPool {
    /// prompts.jsonファイルからロード
    pub fn load_from_file(path: &Path) -> Result<Self, LoadTestError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LoadTestError::ConfigError(format!("Failed to read prompts file: {}", e))
        })?;
        let prompts_file: PromptsFile = serde_json::from_str(&content).map_err(|e| {
            LoadTestError::ConfigError(format!("Failed to parse prompts JSON: {}", e))
        })?;
        Self::from_prompts_file(prompts_file)
    }

    /// PromptsFileから構築
    pub fn from_prompts_file(prompts_file: PromptsFile) -> Result<Self, LoadTestError> {
        if prompts_file.prompts.is_empty() {
            return Err(LoadTestError::EmptyPromptPool);
        }
        Ok(Self {
            prompts: prompts_file.prompts,
            index: AtomicUsize::new(0),
        })
    }

    /// ラウンドロビンで次のプロンプトを取得
    pub fn next_prompt(&self) -> &str {
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.prompts.len();
        &self.prompts[idx]
    }

    /// ランダムにプロンプトを取得
    pub fn random_prompt(&self) -> &str {
        use rand::Rng;
        let idx = rand::thread_rng().gen_range(0..self.prompts.len());
        &self.prompts[idx]
    }

    /// 指定戦略でプロンプトを取得
    pub fn select_prompt(&self, strategy: SelectionStrategy) -> &str {
        match strategy {
            SelectionStrategy::RoundRobin => self.next_prompt(),
            SelectionStrategy::Random => self.random_prompt(),
        }
    }

    /// プール内のプロンプト数
    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn make_pool(prompts: &[&str]) -> PromptPool {
        PromptPool::from_prompts_file(PromptsFile {
            prompts: prompts.iter().map(|s| s.to_string()).collect(),
        })
        .unwrap()
    }

    #[test]
    fn test_default_pool_has_single_prompt() {
        let pool = PromptPool::default();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.next_prompt(), DEFAULT_PROMPT);
    }

    #[test]
    fn test_from_prompts_file_rejects_empty() {
        let result = PromptPool::from_prompts_file(PromptsFile { prompts: vec![] });
        assert!(matches!(result, Err(LoadTestError::EmptyPromptPool)));
    }

    #[test]
    fn test_next_prompt_round_robin_order() {
        let pool = make_pool(&["a", "b", "c"]);
        assert_eq!(pool.next_prompt(), "a");
        assert_eq!(pool.next_prompt(), "b");
        assert_eq!(pool.next_prompt(), "c");
        assert_eq!(pool.next_prompt(), "a");
    }

    #[test]
    fn test_random_prompt_returns_member() {
        let pool = make_pool(&["x", "y"]);
        for _ in 0..20 {
            let p = pool.random_prompt();
            assert!(p == "x" || p == "y");
        }
    }

    #[test]
    fn test_select_prompt_round_robin_strategy() {
        let pool = make_pool(&["a", "b"]);
        assert_eq!(pool.select_prompt(SelectionStrategy::RoundRobin), "a");
        assert_eq!(pool.select_prompt(SelectionStrategy::RoundRobin), "b");
    }

    #[test]
    fn test_concurrent_next_prompt_covers_all_entries() {
        use std::thread;

        let pool = Arc::new(make_pool(&["a", "b", "c", "d"]));
        let mut handles = vec![];
        for _ in 0..4 {
            let p = Arc::clone(&pool);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    let _ = p.next_prompt();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        // 400 selections over 4 entries: the counter wrapped evenly
        assert_eq!(pool.index.load(Ordering::Relaxed), 400);
    }

    #[test]
    fn test_load_from_file_missing_file() {
        let result = PromptPool::load_from_file(Path::new("/nonexistent/prompts.json"));
        assert!(matches!(result, Err(LoadTestError::ConfigError(_))));
    }

    #[test]
    fn test_prompts_file_serde_roundtrip() {
        let file = PromptsFile {
            prompts: vec!["hello".to_string(), "how are you".to_string()],
        };
        let json = serde_json::to_string(&file).unwrap();
        let deserialized: PromptsFile = serde_json::from_str(&json).unwrap();
        assert_eq!(file, deserialized);
    }

    #[test]
    fn test_debug_impl_does_not_panic() {
        let pool = make_pool(&["a"]);
        let s = format!("{:?}", pool);
        assert!(s.contains("PromptPool"));
    }
}
