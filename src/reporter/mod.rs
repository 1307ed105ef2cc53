// Reporter module - Result data models and JSON output
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// レイテンシ集計（ミリ秒）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseTime {
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// エラー種別ごとの内訳
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub name: String,
    pub count: u64,
    pub error_type: String,
}

/// 負荷試験の最終結果。生成後は変更されない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadTestSummary {
    pub test_duration: f64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub requests_per_second: f64,
    pub concurrent_users: u64,
    pub response_time: ResponseTime,
    pub status_codes: HashMap<u16, u64>,
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
    pub started_at: String,
    pub finished_at: String,
}

/// 結果比較レポート
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub rps_change_pct: f64,
    pub latency_mean_change_pct: f64,
    pub latency_p95_change_pct: f64,
    pub latency_p99_change_pct: f64,
    pub error_rate_change: f64,
    pub improvements: Vec<String>,
    pub regressions: Vec<String>,
}

/// JSON結果をファイルに書き出す
pub fn write_json_result(summary: &LoadTestSummary, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// 結果サマリを標準出力に表示する
pub fn display_summary(summary: &LoadTestSummary) {
    println!("=== Load Test Summary ===");
    println!("Duration:         {:.2}s", summary.test_duration);
    println!("Concurrent Users: {}", summary.concurrent_users);
    println!("Total Requests:   {}", summary.total_requests);
    println!("Successful:       {}", summary.successful_requests);
    println!("Failed:           {}", summary.failed_requests);
    println!("Requests/sec:     {:.1}", summary.requests_per_second);
    println!(
        "Latency mean: {:.1}ms | p50: {:.1}ms | p95: {:.1}ms | p99: {:.1}ms",
        summary.response_time.mean_ms,
        summary.response_time.p50_ms,
        summary.response_time.p95_ms,
        summary.response_time.p99_ms,
    );
    if !summary.status_codes.is_empty() {
        println!("Status Code Distribution:");
        let mut codes: Vec<_> = summary.status_codes.iter().collect();
        codes.sort_by_key(|(k, _)| *k);
        for (code, count) in &codes {
            println!("  {}: {}", code, count);
        }
    }
    if !summary.errors.is_empty() {
        println!("Errors:");
        for e in &summary.errors {
            println!("  {} ({}): {}", e.name, e.error_type, e.count);
        }
    }
    println!("=========================");
}

/// パーセンテージ変化を計算する。previous が 0 の場合は 0.0 を返す。
fn pct_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        0.0
    } else {
        (current - previous) / previous * 100.0
    }
}

fn error_rate(summary: &LoadTestSummary) -> f64 {
    if summary.total_requests == 0 {
        0.0
    } else {
        summary.failed_requests as f64 / summary.total_requests as f64
    }
}

/// 2つの結果を比較する
pub fn compare_results(current: &LoadTestSummary, previous: &LoadTestSummary) -> ComparisonReport {
    let rps_change_pct = pct_change(current.requests_per_second, previous.requests_per_second);

    let latency_mean_change_pct =
        pct_change(current.response_time.mean_ms, previous.response_time.mean_ms);
    let latency_p95_change_pct =
        pct_change(current.response_time.p95_ms, previous.response_time.p95_ms);
    let latency_p99_change_pct =
        pct_change(current.response_time.p99_ms, previous.response_time.p99_ms);

    let error_rate_change = error_rate(current) - error_rate(previous);

    let mut improvements = Vec::new();
    let mut regressions = Vec::new();

    // Throughput: higher is better (positive change = improvement)
    if rps_change_pct > 0.0 {
        improvements.push(format!("RPS improved by {:.1}%", rps_change_pct));
    } else if rps_change_pct < 0.0 {
        regressions.push(format!("RPS regressed by {:.1}%", rps_change_pct.abs()));
    }

    // Latency: lower is better (negative change = improvement)
    for (name, change) in [
        ("mean latency", latency_mean_change_pct),
        ("p95 latency", latency_p95_change_pct),
        ("p99 latency", latency_p99_change_pct),
    ] {
        if change < 0.0 {
            improvements.push(format!("{} improved by {:.1}%", name, change.abs()));
        } else if change > 0.0 {
            regressions.push(format!("{} regressed by {:.1}%", name, change));
        }
    }

    // Error rate: lower is better (negative change = improvement)
    if error_rate_change < 0.0 {
        improvements.push(format!(
            "Error rate improved by {:.4}",
            error_rate_change.abs()
        ));
    } else if error_rate_change > 0.0 {
        regressions.push(format!("Error rate regressed by {:.4}", error_rate_change));
    }

    ComparisonReport {
        rps_change_pct,
        latency_mean_change_pct,
        latency_p95_change_pct,
        latency_p99_change_pct,
        error_rate_change,
        improvements,
        regressions,
    }
}
