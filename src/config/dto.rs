//! TOML デシリアライズ用の DTO (Data Transfer Object)
//!
//! # 責務
//!
//! このモジュールは、設定ファイルからのデータ読み込み専用の構造体を提供します。
//! DTO はバリデーション前の「生データ」を表現し、ドメインモデルとは分離されています。
//!
//! ## 設計思想
//!
//! - **単一責務**: TOML のデシリアライズのみを担当
//! - **TOML 構造への密結合**: ファイル構造の変更に柔軟に対応
//! - **バリデーション前の状態**: 欠落したセクションはデフォルト値で補完
//! - **カプセル化**: config モジュール内部のみで使用（外部非公開）
//!
//! ## 変換フロー
//!
//! ```text
//! TOML ファイル
//!   ↓ (デシリアライズ)
//! SettingsDto
//!   ↓ (TryFrom でバリデーション)
//! Settings (ドメインモデル)
//! ```

use serde::Deserialize;

/// 設定ファイル全体の DTO
///
/// すべてのセクションは省略可能で、省略時はドメインモデル側の
/// デフォルト値が使われます。
///
/// **注**: この構造体は config モジュール内部の実装詳細です。
/// 外部からは [`Settings`](super::settings::Settings) を使用してください。
#[derive(Debug, Default, Deserialize)]
pub(super) struct SettingsDto {
    /// `[engine]` セクション
    pub(super) engine: Option<EngineSectionDto>,

    /// `[execution]` セクション
    pub(super) execution: Option<ExecutionSectionDto>,

    /// `[naming]` セクション
    pub(super) naming: Option<NamingSectionDto>,

    /// `[logging]` セクション
    pub(super) logging: Option<LoggingSectionDto>,
}

/// `[engine]` セクションの DTO
#[derive(Debug, Deserialize)]
pub(super) struct EngineSectionDto {
    /// エンジン種別（"docker" | "podman"）
    pub(super) kind: Option<String>,

    /// CLI コマンド名の明示的な上書き
    pub(super) command: Option<String>,
}

/// `[execution]` セクションの DTO
#[derive(Debug, Deserialize)]
pub(super) struct ExecutionSectionDto {
    /// ステップのデフォルトタイムアウト（秒）
    pub(super) step_timeout_secs: Option<u64>,

    /// ログ取得時のデフォルト行数
    pub(super) log_tail: Option<u32>,
}

/// `[naming]` セクションの DTO
#[derive(Debug, Deserialize)]
pub(super) struct NamingSectionDto {
    /// リソース名の接頭辞
    pub(super) prefix: Option<String>,

    /// `created-by` ラベルに入れる識別子
    pub(super) owner_label: Option<String>,
}

/// `[logging]` セクションの DTO
#[derive(Debug, Deserialize)]
pub(super) struct LoggingSectionDto {
    /// ログファイルの出力ディレクトリ
    pub(super) directory: Option<String>,
}
