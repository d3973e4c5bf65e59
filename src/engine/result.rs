//! フロー実行結果の型定義
//!
//! # 責務
//!
//! - ステップ実行結果 [`StepResult`] の型定義
//! - フロー実行結果 [`FlowResult`] の型定義
//! - 実行ステータス [`FlowStatus`] と [`StepStatus`] の型定義
//! - パターン監視結果 [`MatchOutcome`] と [`MatchStatus`] の型定義
//! - 実行エラー [`ExecutionError`] の型定義
//!
//! # 主要な型
//!
//! - [`FlowResult`][]: フロー全体の実行結果（成功/失敗、各ステップの結果、実行時間等）
//! - [`StepResult`][]: 個別ステップの実行結果（出力、検出パターン、警告、所要時間等）
//! - [`FlowStatus`][]: フロー全体の終了ステータス（成功/失敗/タイムアウト/キャンセル）
//! - [`StepStatus`][]: 個別ステップの終了ステータス（成功/失敗/タイムアウト/スキップ）
//! - [`ExecutionError`][]: フロー実行時のエラー型
//!
//! # 使用例
//!
//! ```rust,no_run
//! use container_poker::engine::result::FlowResult;
//!
//! fn handle_result(result: FlowResult) {
//!     if result.is_success() {
//!         println!("フロー成功: {}", result.flow_name);
//!         println!("完了ステップ数: {}/{}", result.completed_steps(), result.steps.len());
//!         println!("実行時間: {:?}", result.total_duration);
//!     } else {
//!         println!("フロー失敗: {:?}", result.error);
//!     }
//!
//!     // JSON形式で出力
//!     if let Ok(json) = result.to_json() {
//!         println!("JSON: {}", json);
//!     }
//! }
//! ```

use crate::error::EngineError;
use serde::Serialize;
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// フロー実行結果
///
/// フロー全体の実行結果を表す型です。
/// 各ステップの実行結果、実行時間、教材ノートなどを含みます。
///
/// # 例
///
/// ```rust,no_run
/// use container_poker::engine::result::FlowResult;
///
/// fn analyze_result(result: FlowResult) {
///     println!("フロー: {} (実行ID: {})", result.flow_name, result.run_id);
///     println!("ステータス: {:?}", result.status);
///
///     for step_result in &result.steps {
///         println!("  ステップ {}: {:?}", step_result.step_name, step_result.status);
///     }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct FlowResult {
    /// フロー名
    ///
    /// JSON 上ではキー `flow` として出力されます。
    #[serde(rename = "flow")]
    pub flow_name: String,

    /// 実行 ID（この実行で作られたリソース名の接尾辞）
    pub run_id: String,

    /// 必須ステップがすべて成功したかどうか
    pub success: bool,

    /// 終了ステータス
    pub status: FlowStatus,

    /// 各ステップの実行結果
    pub steps: Vec<StepResult>,

    /// 実行開始時刻
    pub start_time: SystemTime,

    /// 実行終了時刻
    pub end_time: SystemTime,

    /// 総実行時間
    pub total_duration: Duration,

    /// 教材ノート（成功時）またはデバッグのヒント（失敗時）
    pub notes: Vec<String>,

    /// エラーメッセージ（失敗時のみ。成功時は JSON に現れない）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FlowResult {
    /// 結果をJSON形式でシリアライズ
    ///
    /// # 戻り値
    ///
    /// - `Ok(String)`: JSON文字列
    /// - `Err(serde_json::Error)`: シリアライズ失敗
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// 成功したかどうか
    ///
    /// # 戻り値
    ///
    /// - `true`: ステータスが [`FlowStatus::Succeeded`]
    /// - `false`: それ以外
    pub fn is_success(&self) -> bool {
        matches!(self.status, FlowStatus::Succeeded)
    }

    /// 成功したステップ数
    ///
    /// # 戻り値
    ///
    /// [`StepStatus::Succeeded`] のステップ数
    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step.status, StepStatus::Succeeded))
            .count()
    }

    /// 最初に失敗（またはタイムアウト）したステップ
    ///
    /// # 戻り値
    ///
    /// - `Some(&StepResult)`: 失敗ステップが存在する場合、その最初のもの
    /// - `None`: 全ステップが成功またはスキップ
    pub fn first_failure(&self) -> Option<&StepResult> {
        self.steps
            .iter()
            .find(|step| matches!(step.status, StepStatus::Failed | StepStatus::TimedOut))
    }
}

/// ステップ実行結果
///
/// 個別のステップの実行結果を表す型です。
/// 出力、検出できたパターン、警告、所要時間などを含みます。
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    /// ステップ名
    pub step_name: String,

    /// ステップインデックス（0始まり）
    pub index: usize,

    /// 実行ステータス
    pub status: StepStatus,

    /// ステップの出力（ログ取得や exec の標準出力など）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// 警告（任意パターンの取り逃しなど、失敗扱いにしない注意事項）
    pub warnings: Vec<String>,

    /// パターン監視の結果（`WaitForPattern` ステップのみ）
    pub patterns: Vec<MatchOutcome>,

    /// 所要時間
    pub duration: Duration,

    /// エラーメッセージ（失敗時のみ、エンジンの出力をそのまま保持）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// エラーに対する教材ヒント（エンジン障害の分類から導出）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl StepResult {
    /// 未実行のままスキップされたステップの結果を作る
    pub fn skipped(step_name: impl Into<String>, index: usize) -> Self {
        Self {
            step_name: step_name.into(),
            index,
            status: StepStatus::Skipped,
            output: None,
            warnings: Vec::new(),
            patterns: Vec::new(),
            duration: Duration::ZERO,
            error: None,
            hint: None,
        }
    }

    /// 成功したかどうか
    pub fn is_ok(&self) -> bool {
        matches!(self.status, StepStatus::Succeeded)
    }
}

/// フロー実行ステータス
///
/// フロー全体の終了状態を表します。いずれも終端状態で、
/// フロー単位の自動リトライはありません。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    /// 必須ステップがすべて成功
    Succeeded,

    /// 必須ステップのいずれかが失敗
    Failed,

    /// 必須ステップのいずれかがタイムアウト
    TimedOut,

    /// 呼び出し側の中断により停止（クリーンアップは実施済み）
    Cancelled,
}

/// ステップ実行ステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// 成功
    Succeeded,

    /// 失敗
    Failed,

    /// ステップ上限時間を超過
    TimedOut,

    /// スキップ（先行する必須ステップの失敗により未実行）
    Skipped,
}

/// パターン監視の個別結果
///
/// ログストリームに対して待機した 1 パターンの結末を表します。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchOutcome {
    /// 待機したパターン
    pub pattern: String,

    /// 結末
    pub status: MatchStatus,

    /// パターンに一致した行（一致時のみ）
    pub matched_line: Option<String>,

    /// 正規表現のキャプチャグループ（一致時のみ、グループ 1 以降）
    pub captures: Vec<String>,

    /// 待機開始からの経過時間
    pub elapsed: Duration,
}

/// パターン監視の結末
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// タイムアウト前に一致する行が現れた
    Matched,

    /// ストリームは生きていたが、制限時間内に一致しなかった
    TimedOut,

    /// 一致する前にストリームが終了した（プロセス終了など）
    NotReached,
}

/// 実行エラー
///
/// フロー実行時に発生する可能性のあるエラーを表します。
/// [`ExecutionError::UnknownFlow`] だけが `execute` の `Err` として呼び出し側へ
/// 返り、それ以外はステップ結果の `error` として [`FlowResult`] に畳み込まれます。
///
/// # エラー種別
///
/// - [`ExecutionError::UnknownFlow`] - 存在しないフロー名（リソースは一切作られない）
/// - [`ExecutionError::Engine`] - コンテナエンジンが操作を拒否した
/// - [`ExecutionError::MissingResource`] - 参照先リソースがこの実行に存在しない
/// - [`ExecutionError::StepTimeout`] - ステップが上限時間内に完了しない
/// - [`ExecutionError::PollExhausted`] - ポーリングが全試行で不成立
/// - [`ExecutionError::PatternMissed`] - 必須パターンを検出できなかった
/// - [`ExecutionError::ExecFailed`] - コンテナ内コマンドが非ゼロ終了した
/// - [`ExecutionError::UnexpectedOutput`] - exec の出力が期待と一致しない
/// - [`ExecutionError::InvalidPattern`] - 正規表現パターンが不正
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// 存在しないフロー名
    #[error("未知のフロー名です: \"{0}\"")]
    UnknownFlow(String),

    /// 参照先リソースが未作成
    ///
    /// 作成ステップが任意指定で失敗した場合など、後続ステップの参照が
    /// 宙に浮いたときに発生します。
    #[error("リソース \"{key}\" はこの実行では作成されていません")]
    MissingResource {
        /// 参照された論理キー
        key: String,
    },

    /// コンテナエンジンの障害
    #[error("{0}")]
    Engine(#[from] EngineError),

    /// ステップのタイムアウト
    #[error("タイムアウト: ステップ \"{step_name}\" が {timeout_secs}秒以内に完了しませんでした")]
    StepTimeout {
        /// タイムアウトしたステップ名
        step_name: String,
        /// タイムアウト時間（秒）
        timeout_secs: u64,
    },

    /// ポーリングの試行回数上限に到達
    ///
    /// メッセージはフロー定義の `exhausted_message` がそのまま使われます。
    #[error("{message}")]
    PollExhausted {
        /// フロー定義で宣言された失敗メッセージ
        message: String,
    },

    /// 必須パターンの取り逃し
    #[error("必須パターン \"{pattern}\" を検出できませんでした（{reason}）")]
    PatternMissed {
        /// 待機していたパターン
        pattern: String,
        /// 「タイムアウト」または「ストリーム終了」
        reason: &'static str,
    },

    /// コンテナ内コマンドの非ゼロ終了
    ///
    /// エンジン側の障害（コンテナ不在やデーモン停止）とは区別されます。
    #[error("exec が終了コード {code} で失敗しました: {stderr}")]
    ExecFailed {
        /// コンテナ内コマンドの終了コード
        code: i64,
        /// コマンドの標準エラー出力
        stderr: String,
    },

    /// exec 出力の期待不一致
    #[error("期待した出力が得られませんでした: {0}")]
    UnexpectedOutput(String),

    /// 不正な正規表現
    #[error("正規表現パターンが不正です: {0}")]
    InvalidPattern(#[from] regex::Error),
}
