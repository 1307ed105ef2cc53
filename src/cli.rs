// CLI subcommand definitions using clap derive macros
use clap::Parser;
use std::path::{Path, PathBuf};

use crate::error::LoadTestError;
use crate::reporter::{compare_results, LoadTestSummary};

/// チャットAPI負荷試験ツール
#[derive(Parser, Debug, PartialEq)]
#[command(name = "chat-load-test")]
pub enum Cli {
    /// APIサーバを起動する
    Serve {
        /// JSON設定ファイルパス
        #[arg(long)]
        config: Option<PathBuf>,
        /// リッスンアドレス上書き（例: 0.0.0.0:8000）
        #[arg(long)]
        listen: Option<String>,
    },
    /// 負荷試験を一回実行する
    Run {
        /// 対象チャットエンドポイントURL
        #[arg(long)]
        target: String,
        /// 仮想ユーザ数
        #[arg(long)]
        users: i64,
        /// ユーザ起動レート（人/秒）
        #[arg(long)]
        spawn_rate: f64,
        /// 試験時間（秒）
        #[arg(long)]
        test_time: f64,
        /// リクエストタイムアウト（秒）
        #[arg(long, default_value_t = 10)]
        request_timeout: u64,
        /// プロンプトファイル
        #[arg(long)]
        prompts: Option<PathBuf>,
        /// JSON結果出力先
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// 結果を比較する
    Compare {
        /// 現在の結果JSONファイル
        current: PathBuf,
        /// 過去の結果JSONファイル
        previous: PathBuf,
    },
}

/// compareサブコマンドの実行
///
/// 2つのJSON結果ファイルを読み込み、compare_resultsで比較し、
/// 比較レポートをJSON形式で標準出力に表示する。
pub fn run_compare(current_path: &Path, previous_path: &Path) -> Result<(), LoadTestError> {
    let current_json = std::fs::read_to_string(current_path).map_err(|e| {
        LoadTestError::ConfigError(format!(
            "Failed to read current result file '{}': {}",
            current_path.display(),
            e
        ))
    })?;
    let previous_json = std::fs::read_to_string(previous_path).map_err(|e| {
        LoadTestError::ConfigError(format!(
            "Failed to read previous result file '{}': {}",
            previous_path.display(),
            e
        ))
    })?;

    let current: LoadTestSummary = serde_json::from_str(&current_json).map_err(|e| {
        LoadTestError::ConfigError(format!("Failed to parse current result JSON: {}", e))
    })?;
    let previous: LoadTestSummary = serde_json::from_str(&previous_json).map_err(|e| {
        LoadTestError::ConfigError(format!("Failed to parse previous result JSON: {}", e))
    })?;

    let report = compare_results(&current, &previous);
    let report_json = serde_json::to_string_pretty(&report).map_err(|e| {
        LoadTestError::ConfigError(format!("Failed to serialize comparison report: {}", e))
    })?;
    println!("{}", report_json);
    Ok(())
}
