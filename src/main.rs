//! Container Poker CLI
//!
//! 教材フローの一覧表示・実行・エンジン接続確認を行う薄いバイナリです。
//! ロジックはすべてライブラリ側（`container_poker`）にあり、ここでは
//! 引数解釈とログ初期化、結果の表示だけを担います。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use container_poker::config::Settings;
use container_poker::engine::{FlowEngine, FlowResult, FlowStatus, MatchStatus, StepStatus};
use container_poker::error::ConfigError;
use container_poker::flow::FlowRegistry;
use container_poker::runtime::create_engine;

/// コンテナオーケストレーションを学ぶための教材フロー実行ツール
#[derive(Parser)]
#[command(name = "container-poker")]
#[command(version, about, long_about = None)]
struct Cli {
    /// 設定ファイル（TOML）のパス。省略時はデフォルト設定で動作する
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// デバッグログをコンソールにも出力する
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 実行できるフローの一覧を表示する
    List {
        /// JSON 形式で出力する
        #[arg(long)]
        json: bool,
    },

    /// フローを実行して結果を表示する
    Run {
        /// フロー ID（`list` で確認できる）
        flow: String,

        /// パラメータの上書き（複数指定可）
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// 結果を JSON 形式で出力する
        #[arg(long)]
        json: bool,

        /// ステップタイムアウトの上書き（秒）
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// コンテナエンジンへの接続を確認する
    Doctor,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("設定エラー: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // ガードを握っている間だけファイルへのログ書き出しが生きる
    let _guard = init_tracing(&settings, cli.verbose);

    match cli.command {
        Commands::List { json } => run_list(json),
        Commands::Run {
            flow,
            params,
            json,
            timeout,
        } => run_flow(settings, &flow, &params, json, timeout).await,
        Commands::Doctor => run_doctor(settings).await,
    }
}

/// 設定ファイルを読み込む（未指定ならデフォルト値）
fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    match path {
        Some(path) => Settings::from_file(path),
        None => Ok(Settings::default()),
    }
}

/// ログ初期化: コンソール（人間可読）+ 日次ローテーションの JSON ファイル
///
/// コンソール側は標準エラーへ出すため、`--json` の結果出力と混ざりません。
/// 戻り値のガードが破棄されるとファイル側の書き出しが止まるので、
/// `main` の終わりまで保持してください。
fn init_tracing(settings: &Settings, verbose: bool) -> tracing_appender::non_blocking::WorkerGuard {
    let console_filter = if verbose {
        "container_poker=debug,info"
    } else {
        "container_poker=info,warn"
    };

    let file_appender = tracing_appender::rolling::daily(&settings.log_dir, "container-poker.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::new(console_filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new("container_poker=debug,info")),
        )
        .init();

    guard
}

/// `list` サブコマンド
fn run_list(json: bool) -> ExitCode {
    let registry = FlowRegistry::builtin();
    let summaries = registry.list();

    if json {
        return match serde_json::to_string_pretty(&summaries) {
            Ok(text) => {
                println!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("JSON 変換に失敗しました: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    println!("実行できるフロー:");
    for summary in summaries {
        println!();
        println!(
            "  {}  [{}] ({})",
            summary.id, summary.difficulty, summary.tool
        );
        println!("      {}", summary.description);
    }
    println!();
    println!("`container-poker run <フローID>` で実行できます");
    ExitCode::SUCCESS
}

/// `run` サブコマンド
async fn run_flow(
    mut settings: Settings,
    flow_name: &str,
    raw_params: &[String],
    json: bool,
    timeout_secs: Option<u64>,
) -> ExitCode {
    if let Some(secs) = timeout_secs {
        if secs == 0 {
            eprintln!("--timeout は 1 以上で指定してください");
            return ExitCode::FAILURE;
        }
        settings.step_timeout = Duration::from_secs(secs);
    }

    let params = match parse_params(raw_params) {
        Ok(params) => params,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    let engine = create_engine(&settings);
    let flows = FlowEngine::new(FlowRegistry::builtin(), engine, settings);

    let result = match flows.execute(flow_name, params).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("`container-poker list` で実行できるフローを確認できます");
            return ExitCode::FAILURE;
        }
    };

    if json {
        match result.to_json() {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("JSON 変換に失敗しました: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_result(&result);
    }

    if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// `doctor` サブコマンド
async fn run_doctor(settings: Settings) -> ExitCode {
    let engine = create_engine(&settings);
    match engine.ping().await {
        Ok(version) => {
            println!("コンテナエンジンに接続できました: {}", version);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("コンテナエンジンに接続できません: {}", e);
            if let Some(hint) = e.hint() {
                eprintln!("ヒント: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

/// `KEY=VALUE` 形式の引数をパラメータ表へ変換する
fn parse_params(raw: &[String]) -> Result<HashMap<String, String>, String> {
    let mut params = HashMap::new();
    for item in raw {
        match item.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                params.insert(key.to_string(), value.to_string());
            }
            _ => {
                return Err(format!(
                    "--param は KEY=VALUE 形式で指定してください: \"{}\"",
                    item
                ));
            }
        }
    }
    Ok(params)
}

/// 実行結果を人間可読な形式で表示する
fn print_result(result: &FlowResult) {
    println!();
    println!("フロー: {} (実行 ID: {})", result.flow_name, result.run_id);
    println!("ステータス: {}", flow_status_label(result.status));
    println!("実行時間: {:.1}秒", result.total_duration.as_secs_f64());
    println!();

    for step in &result.steps {
        println!(
            "  [{}] {} ({:.1}秒)",
            step_status_label(step.status),
            step.step_name,
            step.duration.as_secs_f64()
        );
        if let Some(output) = &step.output {
            for line in output.lines() {
                println!("      {}", line);
            }
        }
        for outcome in &step.patterns {
            match outcome.status {
                MatchStatus::Matched => println!("      検出: \"{}\"", outcome.pattern),
                MatchStatus::TimedOut => {
                    println!("      未検出 (タイムアウト): \"{}\"", outcome.pattern)
                }
                MatchStatus::NotReached => {
                    println!("      未検出 (ストリーム終了): \"{}\"", outcome.pattern)
                }
            }
        }
        for warning in &step.warnings {
            println!("      警告: {}", warning);
        }
        if let Some(error) = &step.error {
            println!("      エラー: {}", error);
        }
        if let Some(hint) = &step.hint {
            println!("      ヒント: {}", hint);
        }
    }

    if let Some(error) = &result.error {
        println!();
        println!("エラー: {}", error);
    }

    if !result.notes.is_empty() {
        println!();
        let heading = if result.is_success() {
            "学習ノート"
        } else {
            "デバッグのヒント"
        };
        println!("{}:", heading);
        for note in &result.notes {
            println!("  - {}", note);
        }
    }
}

fn flow_status_label(status: FlowStatus) -> &'static str {
    match status {
        FlowStatus::Succeeded => "成功",
        FlowStatus::Failed => "失敗",
        FlowStatus::TimedOut => "タイムアウト",
        FlowStatus::Cancelled => "キャンセル",
    }
}

fn step_status_label(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Succeeded => "OK",
        StepStatus::Failed => "NG",
        StepStatus::TimedOut => "TIMEOUT",
        StepStatus::Skipped => "SKIP",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params() {
        let raw = vec![
            "message=hello world".to_string(),
            "dsn=host=db;port=5432".to_string(),
        ];
        let params = parse_params(&raw).unwrap();

        assert_eq!(params.get("message").map(String::as_str), Some("hello world"));
        // 最初の = だけを区切りにする
        assert_eq!(
            params.get("dsn").map(String::as_str),
            Some("host=db;port=5432")
        );
    }

    #[test]
    fn test_parse_params_rejects_malformed() {
        assert!(parse_params(&["no_equals_sign".to_string()]).is_err());
        assert!(parse_params(&["=value_without_key".to_string()]).is_err());
    }

    /// 後勝ちで上書きされること
    #[test]
    fn test_parse_params_last_wins() {
        let raw = vec!["key=first".to_string(), "key=second".to_string()];
        let params = parse_params(&raw).unwrap();
        assert_eq!(params.get("key").map(String::as_str), Some("second"));
    }
}
