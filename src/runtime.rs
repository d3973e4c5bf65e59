//! コンテナエンジン抽象化レイヤー（CLI 版）
//!
//! # 責務
//!
//! - Docker 互換エンジン（Docker, Podman）を統一的に扱うインターフェースを提供
//! - 設定に応じた適切なクライアントを生成するファクトリー機能
//! - リソースハンドル・作成仕様・検査結果などエンジン非依存の型を定義
//!
//! # アーキテクチャ
//!
//! このモジュールは **CLI ツール呼び出しベース** で設計されています。
//! デーモンのソケット管理や認証は CLI に委譲し、コード内では扱いません。
//!
//! ## 使用する CLI ツール
//!
//! - **Docker**: `docker` コマンド
//! - **Podman**: `podman` コマンド（Docker CLI 互換のため同一実装で対応）
//!
//! # モジュール構成
//!
//! - `traits` - 共通インターフェース（[`ContainerEngine`] トレイト等）
//! - `docker` - Docker 互換 CLI クライアント
//!
//! # 使用例
//!
//! ```rust,no_run
//! use container_poker::config::Settings;
//! use container_poker::runtime::create_engine;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::default();
//!     let engine = create_engine(&settings);
//!
//!     let version = engine.ping().await?;
//!     println!("engine version: {}", version);
//!     Ok(())
//! }
//! ```

pub mod docker;
pub mod traits;

// 公開APIの再エクスポート
pub use traits::{
    ContainerEngine, ContainerHandle, ContainerSpec, ContainerState, ExecOutput, HealthState,
    HealthcheckSpec, InspectReport, LogStream, MountSpec, NetworkHandle, NetworkSpec, PortMapping,
    VolumeHandle, VolumeSpec, explain_exit_code,
};

use std::sync::Arc;

use crate::config::{EngineKind, Settings};

/// コンテナエンジンクライアントを生成するファクトリー関数
///
/// 設定のエンジン種別とコマンド名上書きから適切な CLI クライアントを
/// 生成します。複数のフロー実行で共有できるよう `Arc` で返します。
///
/// # 引数
///
/// - `settings`: エンジン種別・コマンド名を含む設定
///
/// # 例
///
/// ```rust
/// use container_poker::config::Settings;
/// use container_poker::runtime::create_engine;
///
/// let engine = create_engine(&Settings::default());
/// ```
pub fn create_engine(settings: &Settings) -> Arc<dyn ContainerEngine> {
    if let Some(command) = &settings.engine_command {
        return Arc::new(docker::DockerCli::with_command(command.clone()));
    }

    match settings.engine {
        EngineKind::Docker => Arc::new(docker::DockerCli::new()),
        EngineKind::Podman => Arc::new(docker::DockerCli::with_command("podman")),
    }
}
