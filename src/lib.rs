//! Container Poker - コンテナオーケストレーションの教材エンジン
//!
//! コンテナ技術を学ぶための、小さなオーケストレーションエンジンです。
//! 「フロー」と呼ばれる宣言的なステップ列（コンテナ作成、ログ監視、
//! 条件ポーリング、クリーンアップ）を Docker / Podman に対して実行し、
//! 各ステップの診断と学習ノートを含む結果レポートを返します。
//!
//! # レイヤ構成
//!
//! - [`flow`] - フロー定義の語彙と組み込みカタログ（データのみ）
//! - [`engine`] - フローの解釈と実行、リソース追跡、パターン監視
//! - [`runtime`] - コンテナエンジン（Docker/Podman CLI）との接点
//! - [`config`] - TOML 設定の読み込みとバリデーション
//! - [`error`] - 基盤エラー型（設定とエンジン）
//!
//! `flow` は `engine` を知らず、`engine` は [`runtime::ContainerEngine`]
//! トレイト越しにしかエンジンへ触れません。テストではこのトレイトを
//! 差し替えることで、実際のコンテナエンジンなしで全経路を検証できます。
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
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::default();
//! let engine = create_engine(&settings);
//! let flows = FlowEngine::new(FlowRegistry::builtin(), engine, settings);
//!
//! let mut params = HashMap::new();
//! params.insert("message".to_string(), "こんにちはコンテナ".to_string());
//!
//! let result = flows.execute("hello_world", params).await?;
//! println!("{}", result.to_json()?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod flow;
pub mod runtime;

// よく使う型のトップレベル再エクスポート
pub use engine::{ExecutionError, FlowEngine, FlowResult, FlowStatus};
pub use flow::FlowRegistry;
