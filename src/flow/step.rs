//! フローステップの定義
//!
//! # 責務
//!
//! Flow を構成する Step の定義体を提供するモジュール。
//! ステップは「何をするか」を宣言するデータであり、解釈と実行は
//! `engine::executor` が担います。
//!
//! # 主要な型
//!
//! - [`FlowStep`] - 名前・種別・必須フラグ・タイムアウトを持つ 1 ステップ
//! - [`StepKind`] - エンジン操作 / パターン待機 / 条件ポーリング / クリーンアップ
//! - [`EngineAction`] - コンテナエンジンへの個別操作とそのパラメータ
//! - [`PatternSpec`] / [`MatchRule`] - ログ行の一致条件
//! - [`PollCondition`] - ポーリングの成立条件

use std::time::Duration;

use crate::runtime::{ContainerSpec, ContainerState, HealthState, NetworkSpec, VolumeSpec};

/// フロー内の 1 ステップ
///
/// `required` が `false` のステップは失敗してもフロー全体を
/// 失敗させません（結果には警告として残ります）。
#[derive(Debug, Clone)]
pub struct FlowStep {
    /// ステップ名（結果レポートに表示される）
    pub name: String,

    /// ステップの種別と内容
    pub kind: StepKind,

    /// このステップの失敗がフロー全体を失敗させるか
    pub required: bool,

    /// ステップ個別のタイムアウト（`None` なら設定のデフォルト）
    pub timeout: Option<Duration>,
}

impl FlowStep {
    /// エンジン操作ステップを作る
    pub fn action(name: impl Into<String>, action: EngineAction) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::Action(action),
            required: true,
            timeout: None,
        }
    }

    /// ログパターン待機ステップを作る
    pub fn wait_for_patterns(
        name: impl Into<String>,
        source: impl Into<String>,
        patterns: Vec<PatternSpec>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::WaitForPattern {
                source: source.into(),
                patterns,
            },
            required: true,
            timeout: None,
        }
    }

    /// 条件ポーリングステップを作る
    pub fn poll_until(
        name: impl Into<String>,
        condition: PollCondition,
        interval: Duration,
        max_attempts: u32,
        exhausted_message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::PollUntil {
                condition,
                interval,
                max_attempts,
                exhausted_message: exhausted_message.into(),
            },
            required: true,
            timeout: None,
        }
    }

    /// クリーンアップステップを作る
    ///
    /// `resources` が空の場合、その時点で追跡中の全リソースを
    /// 作成の逆順で解放します。
    pub fn cleanup(name: impl Into<String>, resources: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::Cleanup { resources },
            required: true,
            timeout: None,
        }
    }

    /// 任意ステップ（失敗してもフローを失敗させない）にする
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// ステップ個別のタイムアウトを設定する
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// クリーンアップステップかどうか
    ///
    /// 必須ステップの失敗後もクリーンアップステップだけは実行されます。
    pub fn is_cleanup(&self) -> bool {
        matches!(self.kind, StepKind::Cleanup { .. })
    }
}

/// ステップの種別
#[derive(Debug, Clone)]
pub enum StepKind {
    /// コンテナエンジンへの 1 操作
    Action(EngineAction),

    /// リソースのログストリームに対する順序付きパターン待機
    WaitForPattern {
        /// ログを読むリソースのキー
        source: String,
        /// 待機するパターン（宣言順に消費される）
        patterns: Vec<PatternSpec>,
    },

    /// 条件が成立するまでの繰り返し確認
    PollUntil {
        /// 成立を判定する条件
        condition: PollCondition,
        /// 試行間隔
        interval: Duration,
        /// 最大試行回数
        max_attempts: u32,
        /// 全試行が失敗したときのエラーメッセージ
        exhausted_message: String,
    },

    /// 指定リソースのベストエフォート解放
    Cleanup {
        /// 解放するリソースのキー（空なら追跡中の全リソース）
        resources: Vec<String>,
    },
}

/// コンテナエンジンへの個別操作
///
/// `key` はフロー内でリソースを参照する論理名です。実際のエンジン上の
/// 名前は実行コンテキストが接頭辞と実行 ID から導出します。
#[derive(Debug, Clone)]
pub enum EngineAction {
    /// コンテナを作成し、`key` で追跡を開始する
    CreateContainer {
        key: String,
        spec: ContainerSpec,
    },

    /// 作成済みコンテナを開始する
    StartContainer { key: String },

    /// コンテナを停止する
    StopContainer { key: String },

    /// コンテナを削除し、追跡から外す
    RemoveContainer { key: String },

    /// コンテナのログを取得してステップ出力にする
    FetchLogs { key: String },

    /// コンテナ内でコマンドを実行する
    Exec {
        key: String,
        command: Vec<String>,
        /// 標準出力への期待（未達ならステップ失敗）
        expect: Option<MatchRule>,
    },

    /// コンテナの状態を検査してステップ出力にする
    Inspect { key: String },

    /// ネットワークを作成し、`key` で追跡を開始する
    CreateNetwork {
        key: String,
        spec: NetworkSpec,
    },

    /// コンテナをネットワークに接続する
    ConnectNetwork {
        network: String,
        container: String,
    },

    /// ボリュームを作成し、`key` で追跡を開始する
    CreateVolume {
        key: String,
        spec: VolumeSpec,
    },
}

impl EngineAction {
    /// この操作が新しいリソースを作成する場合、その論理キー
    pub fn creates_key(&self) -> Option<&str> {
        match self {
            EngineAction::CreateContainer { key, .. }
            | EngineAction::CreateNetwork { key, .. }
            | EngineAction::CreateVolume { key, .. } => Some(key),
            _ => None,
        }
    }

    /// この操作が参照する既存リソースの論理キー
    pub fn references(&self) -> Vec<&str> {
        match self {
            EngineAction::StartContainer { key }
            | EngineAction::StopContainer { key }
            | EngineAction::RemoveContainer { key }
            | EngineAction::FetchLogs { key }
            | EngineAction::Exec { key, .. }
            | EngineAction::Inspect { key } => vec![key],
            EngineAction::ConnectNetwork { network, container } => {
                vec![network, container]
            }
            EngineAction::CreateContainer { .. }
            | EngineAction::CreateNetwork { .. }
            | EngineAction::CreateVolume { .. } => Vec::new(),
        }
    }
}

/// ログ行への一致条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchRule {
    /// 部分文字列の完全一致
    Exact(String),

    /// 正規表現（キャプチャグループを記録する）
    Regex(String),
}

impl MatchRule {
    /// 一致条件の表示用文字列
    pub fn pattern(&self) -> &str {
        match self {
            MatchRule::Exact(s) | MatchRule::Regex(s) => s,
        }
    }
}

impl std::fmt::Display for MatchRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchRule::Exact(s) => write!(f, "{}", s),
            MatchRule::Regex(s) => write!(f, "/{}/", s),
        }
    }
}

/// 1 つの待機パターン
///
/// タイムアウトはこのパターンの待機を開始した時点から計測されます
/// （ストリーム開始時点からではありません）。
#[derive(Debug, Clone)]
pub struct PatternSpec {
    /// 一致条件
    pub rule: MatchRule,

    /// このパターン固有のタイムアウト
    pub timeout: Duration,

    /// 不一致がステップを失敗させるか
    pub required: bool,
}

impl PatternSpec {
    /// 部分文字列パターンを作る
    pub fn exact(pattern: impl Into<String>, timeout: Duration) -> Self {
        Self {
            rule: MatchRule::Exact(pattern.into()),
            timeout,
            required: true,
        }
    }

    /// 正規表現パターンを作る
    pub fn regex(pattern: impl Into<String>, timeout: Duration) -> Self {
        Self {
            rule: MatchRule::Regex(pattern.into()),
            timeout,
            required: true,
        }
    }

    /// 任意パターン（不一致でも警告どまり）にする
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// ポーリングの成立条件
#[derive(Debug, Clone)]
pub enum PollCondition {
    /// コンテナ内コマンドが成功し、出力に部分文字列が含まれる
    ExecOutputContains {
        /// 対象コンテナのキー
        key: String,
        /// 実行するコマンド
        command: Vec<String>,
        /// 標準出力に期待する部分文字列
        needle: String,
    },

    /// コンテナが指定の状態にある
    ContainerInState {
        /// 対象コンテナのキー
        key: String,
        /// 期待する状態
        state: ContainerState,
    },

    /// ヘルスチェックが指定の判定になっている
    HealthIs {
        /// 対象コンテナのキー
        key: String,
        /// 期待する判定
        state: HealthState,
    },
}

impl PollCondition {
    /// 条件が参照するリソースの論理キー
    pub fn key(&self) -> &str {
        match self {
            PollCondition::ExecOutputContains { key, .. }
            | PollCondition::ContainerInState { key, .. }
            | PollCondition::HealthIs { key, .. } => key,
        }
    }

    /// 条件の表示用説明
    pub fn describe(&self) -> String {
        match self {
            PollCondition::ExecOutputContains { command, needle, .. } => {
                format!("`{}` の出力に \"{}\"", command.join(" "), needle)
            }
            PollCondition::ContainerInState { state, .. } => {
                format!("状態が {}", state)
            }
            PollCondition::HealthIs { state, .. } => {
                format!("ヘルス判定が {}", state)
            }
        }
    }
}
