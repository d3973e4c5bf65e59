//! 実行設定のドメインモデル
//!
//! # 責務
//!
//! - 設定ファイル（TOML)の読み込みとバリデーション
//! - エンジン種別・タイムアウト・命名規則のデフォルト値の提供
//!
//! # 設定ファイル例
//!
//! ```toml
//! [engine]
//! kind = "docker"
//!
//! [execution]
//! step_timeout_secs = 120
//! log_tail = 100
//!
//! [naming]
//! prefix = "cpoker"
//! owner_label = "containerpoker"
//!
//! [logging]
//! directory = "logs"
//! ```
//!
//! ファイルが存在しない運用も想定されるため、[`Settings::default`] が
//! そのまま使える完全なデフォルト値を持ちます。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::dto::SettingsDto;
use crate::error::ConfigError;

/// デフォルトのステップタイムアウト（秒）
const DEFAULT_STEP_TIMEOUT_SECS: u64 = 120;

/// デフォルトのログ取得行数
const DEFAULT_LOG_TAIL: u32 = 100;

/// デフォルトのリソース名接頭辞
const DEFAULT_NAME_PREFIX: &str = "cpoker";

/// デフォルトの所有者ラベル値
const DEFAULT_OWNER_LABEL: &str = "containerpoker";

/// デフォルトのログ出力ディレクトリ
const DEFAULT_LOG_DIR: &str = "logs";

/// コンテナエンジンの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Docker (`docker` コマンド)
    Docker,
    /// Podman (`podman` コマンド、Docker CLI 互換)
    Podman,
}

/// 実行設定（ドメインモデル）
///
/// バリデーション済みの設定値を保持します。
///
/// ## DTO との違い
///
/// - [`SettingsDto`](super::dto::SettingsDto): TOML デシリアライズ専用
/// - [`Settings`]: バリデーション済み、デフォルト値を補完済み
#[derive(Debug, Clone)]
pub struct Settings {
    /// エンジン種別
    pub engine: EngineKind,

    /// CLI コマンド名の明示的な上書き（`None` なら種別のデフォルト）
    pub engine_command: Option<String>,

    /// ステップのデフォルトタイムアウト
    pub step_timeout: Duration,

    /// ログ取得アクションのデフォルト行数
    pub log_tail: u32,

    /// リソース名の接頭辞
    pub name_prefix: String,

    /// `created-by` ラベルに入れる識別子
    pub owner_label: String,

    /// ログファイルの出力ディレクトリ
    pub log_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine: EngineKind::Docker,
            engine_command: None,
            step_timeout: Duration::from_secs(DEFAULT_STEP_TIMEOUT_SECS),
            log_tail: DEFAULT_LOG_TAIL,
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            owner_label: DEFAULT_OWNER_LABEL.to_string(),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl Settings {
    /// 設定ファイルを読み込む
    ///
    /// # 引数
    ///
    /// - `path`: TOML ファイルのパス
    ///
    /// # エラー
    ///
    /// - [`ConfigError::FileRead`] - ファイルが読めない
    /// - [`ConfigError::TomlDeserialize`] - TOML として不正
    /// - [`ConfigError::Validation`] - 値のバリデーション失敗
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// TOML 文字列から設定を構築する
    ///
    /// # 例
    ///
    /// ```
    /// use container_poker::config::Settings;
    ///
    /// let settings = Settings::from_str(r#"
    /// [execution]
    /// step_timeout_secs = 30
    /// "#).unwrap();
    ///
    /// assert_eq!(settings.step_timeout.as_secs(), 30);
    /// ```
    pub fn from_str(toml: &str) -> Result<Self, ConfigError> {
        let dto: SettingsDto = toml::from_str(toml)?;
        Self::try_from(dto)
    }

    /// リソース名接頭辞として妥当か
    ///
    /// エンジンのリソース名規則（先頭は英数字、以降は英数字と `_.-`）に
    /// 合わせています。
    fn is_valid_name_prefix(value: &str) -> bool {
        let mut chars = value.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphanumeric() => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    }
}

/// DTO からドメインモデルへの変換
///
/// バリデーションを実施し、不正なデータの場合は
/// [`ConfigError::Validation`] を返します。
impl TryFrom<SettingsDto> for Settings {
    type Error = ConfigError;

    fn try_from(dto: SettingsDto) -> Result<Self, Self::Error> {
        let mut settings = Settings::default();

        if let Some(engine) = dto.engine {
            if let Some(kind) = engine.kind {
                settings.engine = match kind.as_str() {
                    "docker" => EngineKind::Docker,
                    "podman" => EngineKind::Podman,
                    other => {
                        return Err(ConfigError::Validation(format!(
                            "engine.kind が不正です: \"{}\" (docker | podman)",
                            other
                        )));
                    }
                };
            }
            if let Some(command) = engine.command {
                if command.trim().is_empty() {
                    return Err(ConfigError::Validation(
                        "engine.command に空文字列は指定できません".to_string(),
                    ));
                }
                settings.engine_command = Some(command);
            }
        }

        if let Some(execution) = dto.execution {
            if let Some(secs) = execution.step_timeout_secs {
                if secs == 0 {
                    return Err(ConfigError::Validation(
                        "execution.step_timeout_secs は 1 以上で指定してください".to_string(),
                    ));
                }
                settings.step_timeout = Duration::from_secs(secs);
            }
            if let Some(tail) = execution.log_tail {
                settings.log_tail = tail;
            }
        }

        if let Some(naming) = dto.naming {
            if let Some(prefix) = naming.prefix {
                if !Self::is_valid_name_prefix(&prefix) {
                    return Err(ConfigError::Validation(format!(
                        "naming.prefix が不正です: \"{}\" (先頭は英数字、以降は英数字と _.-)",
                        prefix
                    )));
                }
                settings.name_prefix = prefix;
            }
            if let Some(owner) = naming.owner_label {
                if owner.trim().is_empty() {
                    return Err(ConfigError::Validation(
                        "naming.owner_label に空文字列は指定できません".to_string(),
                    ));
                }
                settings.owner_label = owner;
            }
        }

        if let Some(logging) = dto.logging
            && let Some(directory) = logging.directory
        {
            settings.log_dir = PathBuf::from(directory);
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 空の TOML でもデフォルト値で構築できること
    #[test]
    fn test_from_str_empty() {
        let settings = Settings::from_str("").unwrap();
        assert_eq!(settings.engine, EngineKind::Docker);
        assert_eq!(settings.step_timeout.as_secs(), DEFAULT_STEP_TIMEOUT_SECS);
        assert_eq!(settings.log_tail, DEFAULT_LOG_TAIL);
        assert_eq!(settings.name_prefix, DEFAULT_NAME_PREFIX);
        assert_eq!(settings.owner_label, DEFAULT_OWNER_LABEL);
    }

    /// 全セクションを指定した読み込み
    #[test]
    fn test_from_str_full() {
        let toml = r#"
            [engine]
            kind = "podman"
            command = "podman-remote"

            [execution]
            step_timeout_secs = 45
            log_tail = 50

            [naming]
            prefix = "lab"
            owner_label = "classroom"

            [logging]
            directory = "/tmp/poker-logs"
        "#;

        let settings = Settings::from_str(toml).unwrap();
        assert_eq!(settings.engine, EngineKind::Podman);
        assert_eq!(settings.engine_command.as_deref(), Some("podman-remote"));
        assert_eq!(settings.step_timeout, Duration::from_secs(45));
        assert_eq!(settings.log_tail, 50);
        assert_eq!(settings.name_prefix, "lab");
        assert_eq!(settings.owner_label, "classroom");
        assert_eq!(settings.log_dir, PathBuf::from("/tmp/poker-logs"));
    }

    /// 不正なエンジン種別はバリデーションエラーになること
    #[test]
    fn test_invalid_engine_kind() {
        let result = Settings::from_str(
            r#"
            [engine]
            kind = "kubernetes"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    /// タイムアウト 0 秒は拒否されること
    #[test]
    fn test_zero_timeout_rejected() {
        let result = Settings::from_str(
            r#"
            [execution]
            step_timeout_secs = 0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    /// 接頭辞の名前規則
    #[test]
    fn test_name_prefix_validation() {
        assert!(Settings::is_valid_name_prefix("cpoker"));
        assert!(Settings::is_valid_name_prefix("lab01.test-a_b"));
        assert!(!Settings::is_valid_name_prefix(""));
        assert!(!Settings::is_valid_name_prefix("-leading-dash"));
        assert!(!Settings::is_valid_name_prefix("日本語"));

        let result = Settings::from_str(
            r#"
            [naming]
            prefix = "-bad"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    /// TOML 構文エラーの伝播
    #[test]
    fn test_broken_toml() {
        let result = Settings::from_str("[engine\nkind = docker");
        assert!(matches!(result, Err(ConfigError::TomlDeserialize(_))));
    }
}
