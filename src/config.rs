//! 実行設定レイヤー
//!
//! # 責務
//!
//! - TOML 設定ファイルの読み込み（DTO）とバリデーション（ドメインモデル）
//! - エンジン種別・タイムアウト・命名規則などの実行時パラメータの提供
//!
//! # モジュール構成
//!
//! - `dto` - TOML デシリアライズ専用の内部構造体
//! - `settings` - バリデーション済みドメインモデル [`Settings`]
//!
//! # 使用例
//!
//! ```
//! use container_poker::config::Settings;
//!
//! // ファイルなしでもデフォルト値で動作する
//! let settings = Settings::default();
//! assert_eq!(settings.name_prefix, "cpoker");
//! ```

mod dto;
pub mod settings;

// 公開APIの再エクスポート
pub use settings::{EngineKind, Settings};
