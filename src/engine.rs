//! フロー実行レイヤ
//!
//! # 責務
//!
//! - フロー定義（`flow` モジュール）を受け取り、各ステップを宣言順に実行
//! - 実行 1 回分のリソース追跡と、終了時の暗黙クリーンアップ
//! - ログストリームに対する順序付きパターン監視
//! - ステップタイムアウト・協調的キャンセル・結果集約
//!
//! # モジュール構成
//!
//! - [`executor`][]: フロー実行エンジン本体
//! - [`context`][]: 実行コンテキスト（リソース台帳と命名）
//! - [`watcher`][]: ログのパターン監視
//! - [`result`][]: 実行結果型（ステップ&フロー結果）
//!
//! # 使用例
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//!
//! use container_poker::config::Settings;
//! use container_poker::engine::FlowEngine;
//! use container_poker::flow::FlowRegistry;
//! use container_poker::runtime::create_engine;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::default();
//!     let engine = create_engine(&settings);
//!     let flows = FlowEngine::new(FlowRegistry::builtin(), engine, settings);
//!
//!     let result = flows.execute("hello_world", HashMap::new()).await?;
//!
//!     println!("フロー: {}", result.flow_name);
//!     println!("ステータス: {:?}", result.status);
//!     println!("実行時間: {:?}", result.total_duration);
//!
//!     for step_result in &result.steps {
//!         println!("  ステップ {}: {:?}", step_result.step_name, step_result.status);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod executor;
pub mod result;
pub mod watcher;

// 公開APIの再エクスポート
pub use context::{ExecutionContext, ResourceHandle};
pub use executor::FlowEngine;
pub use result::{
    ExecutionError, FlowResult, FlowStatus, MatchOutcome, MatchStatus, StepResult, StepStatus,
};
