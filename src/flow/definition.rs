//! フロー（教材ワークフロー）の定義体
//!
//! # 責務
//!
//! - フローのメタデータ（名前・説明・難易度・使用技術）とステップ列を束ねる
//! - 登録前のバリデーション（リソースキーの整合、イメージ参照、正規表現）
//! - 一覧表示用のサマリー型を提供
//!
//! # 使用例
//!
//! ```
//! use container_poker::flow::{Difficulty, Flow, FlowStep};
//! use container_poker::flow::step::EngineAction;
//! use container_poker::runtime::ContainerSpec;
//!
//! let flow = Flow::new(
//!     "echo_demo",
//!     "Echo Demo",
//!     "コンテナを 1 つ作って消すだけの最小フロー",
//!     Difficulty::Beginner,
//!     "engine-api",
//! )
//! .steps(vec![
//!     FlowStep::action(
//!         "create",
//!         EngineAction::CreateContainer {
//!             key: "demo".to_string(),
//!             spec: ContainerSpec {
//!                 image: "alpine:latest".to_string(),
//!                 command: vec!["true".to_string()],
//!                 ..ContainerSpec::default()
//!             },
//!         },
//!     ),
//!     FlowStep::cleanup("teardown", Vec::new()),
//! ]);
//!
//! assert!(flow.validate().is_ok());
//! ```

use std::collections::{HashMap, HashSet};

use regex::Regex;
use serde::Serialize;

use super::step::{EngineAction, FlowStep, MatchRule, StepKind};
use crate::error::ConfigError;

/// イメージ参照の許容形式
///
/// 小文字のリポジトリパスと任意のタグ。レジストリホストのドットや
/// ネストしたパスも受け付けます。
const IMAGE_REFERENCE_PATTERN: &str =
    r"^[a-z0-9]+([._-][a-z0-9]+)*(/[a-z0-9]+([._-][a-z0-9]+)*)*(:[a-zA-Z0-9_][a-zA-Z0-9._-]*)?$";

/// フローの難易度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// 入門（単一コンテナのライフサイクル）
    Beginner,
    /// 中級（複数リソースの連携）
    Intermediate,
    /// 上級（ヘルスチェックやネットワーク分離）
    Advanced,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        };
        write!(f, "{}", label)
    }
}

/// 教材フロー
///
/// 一意な `name` で登録され、登録後は変更されません。
#[derive(Debug, Clone)]
pub struct Flow {
    /// フロー ID（レジストリ内で一意）
    pub name: String,

    /// 表示名
    pub display_name: String,

    /// 学習内容の説明
    pub description: String,

    /// 難易度
    pub difficulty: Difficulty,

    /// 使用している技術のタグ（例: "pattern-watch"）
    pub tool: String,

    /// 実行順のステップ列
    pub steps: Vec<FlowStep>,

    /// パラメータのデフォルト値（呼び出し側の指定で上書き可能）
    pub defaults: HashMap<String, String>,

    /// 成功時に結果へ添える学習ノート
    pub notes: Vec<String>,
}

impl Flow {
    /// メタデータだけのフローを作る（ステップは [`Flow::steps`] で設定）
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        difficulty: Difficulty,
        tool: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            description: description.into(),
            difficulty,
            tool: tool.into(),
            steps: Vec::new(),
            defaults: HashMap::new(),
            notes: Vec::new(),
        }
    }

    /// ステップ列を設定する
    pub fn steps(mut self, steps: Vec<FlowStep>) -> Self {
        self.steps = steps;
        self
    }

    /// パラメータのデフォルト値を 1 つ追加する
    pub fn default_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    /// 学習ノートを設定する
    pub fn notes(mut self, notes: Vec<&str>) -> Self {
        self.notes = notes.into_iter().map(String::from).collect();
        self
    }

    /// 一覧表示用のサマリーを返す
    pub fn summary(&self) -> FlowSummary {
        FlowSummary {
            id: self.name.clone(),
            name: self.display_name.clone(),
            description: self.description.clone(),
            difficulty: self.difficulty,
            tool: self.tool.clone(),
        }
    }

    /// フロー定義の整合性を検証する
    ///
    /// 以下を確認します。
    ///
    /// - フロー ID が命名規則（小文字英数字とアンダースコア）に従う
    /// - ステップが 1 つ以上ある
    /// - 参照されるリソースキーがすべて先行ステップで作成されている
    /// - リソースキーの重複作成がない
    /// - イメージ参照が妥当な形式である
    /// - 正規表現パターンがコンパイルできる
    ///
    /// # エラー
    ///
    /// - [`ConfigError::Validation`] - いずれかの検証に失敗
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty()
            || !self
                .name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(ConfigError::Validation(format!(
                "フロー ID が不正です: \"{}\" (小文字英数字と _ のみ)",
                self.name
            )));
        }

        if self.steps.is_empty() {
            return Err(ConfigError::Validation(format!(
                "フロー \"{}\" にステップがありません",
                self.name
            )));
        }

        let image_reference = Regex::new(IMAGE_REFERENCE_PATTERN)
            .map_err(|e| ConfigError::Validation(format!("イメージ検証パターン: {}", e)))?;

        let mut defined: HashSet<&str> = HashSet::new();

        for step in &self.steps {
            match &step.kind {
                StepKind::Action(action) => {
                    for key in action.references() {
                        self.ensure_defined(&defined, key, &step.name)?;
                    }

                    if let EngineAction::CreateContainer { spec, .. } = action {
                        if !image_reference.is_match(&spec.image) {
                            return Err(ConfigError::Validation(format!(
                                "フロー \"{}\" ステップ \"{}\": イメージ参照が不正です: \"{}\"",
                                self.name, step.name, spec.image
                            )));
                        }
                        if let Some(network) = &spec.network {
                            self.ensure_defined(&defined, network, &step.name)?;
                        }
                        for mount in &spec.mounts {
                            self.ensure_defined(&defined, &mount.source, &step.name)?;
                        }
                    }

                    if let Some(key) = action.creates_key() {
                        if !defined.insert(key) {
                            return Err(ConfigError::Validation(format!(
                                "フロー \"{}\" ステップ \"{}\": リソースキー \"{}\" は既に作成されています",
                                self.name, step.name, key
                            )));
                        }
                    }

                    if let EngineAction::Exec {
                        expect: Some(MatchRule::Regex(pattern)),
                        ..
                    } = action
                    {
                        Regex::new(pattern).map_err(|e| {
                            ConfigError::Validation(format!(
                                "フロー \"{}\" ステップ \"{}\": 正規表現が不正です: {}",
                                self.name, step.name, e
                            ))
                        })?;
                    }
                }
                StepKind::WaitForPattern { source, patterns } => {
                    self.ensure_defined(&defined, source, &step.name)?;
                    for pattern in patterns {
                        if let MatchRule::Regex(raw) = &pattern.rule {
                            Regex::new(raw).map_err(|e| {
                                ConfigError::Validation(format!(
                                    "フロー \"{}\" ステップ \"{}\": 正規表現が不正です: {}",
                                    self.name, step.name, e
                                ))
                            })?;
                        }
                    }
                }
                StepKind::PollUntil {
                    condition,
                    max_attempts,
                    ..
                } => {
                    self.ensure_defined(&defined, condition.key(), &step.name)?;
                    if *max_attempts == 0 {
                        return Err(ConfigError::Validation(format!(
                            "フロー \"{}\" ステップ \"{}\": max_attempts は 1 以上が必要です",
                            self.name, step.name
                        )));
                    }
                }
                StepKind::Cleanup { resources } => {
                    for key in resources {
                        self.ensure_defined(&defined, key, &step.name)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn ensure_defined(
        &self,
        defined: &HashSet<&str>,
        key: &str,
        step_name: &str,
    ) -> Result<(), ConfigError> {
        if defined.contains(key) {
            Ok(())
        } else {
            Err(ConfigError::Validation(format!(
                "フロー \"{}\" ステップ \"{}\": リソースキー \"{}\" は未作成です",
                self.name, step_name, key
            )))
        }
    }
}

/// フロー一覧の 1 エントリ
///
/// レジストリの登録順で並びます。
#[derive(Debug, Clone, Serialize)]
pub struct FlowSummary {
    /// フロー ID
    pub id: String,

    /// 表示名
    pub name: String,

    /// 説明
    pub description: String,

    /// 難易度
    pub difficulty: Difficulty,

    /// 使用している技術のタグ
    pub tool: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::step::{PatternSpec, PollCondition};
    use crate::runtime::{ContainerSpec, ContainerState};
    use std::time::Duration;

    fn create_step(key: &str, image: &str) -> FlowStep {
        FlowStep::action(
            format!("create_{}", key),
            EngineAction::CreateContainer {
                key: key.to_string(),
                spec: ContainerSpec {
                    image: image.to_string(),
                    ..ContainerSpec::default()
                },
            },
        )
    }

    /// 正しい定義が検証を通ること
    #[test]
    fn test_validate_ok() {
        let flow = Flow::new(
            "sample",
            "Sample",
            "desc",
            Difficulty::Beginner,
            "engine-api",
        )
        .steps(vec![
            create_step("demo", "ubuntu:latest"),
            FlowStep::action(
                "start",
                EngineAction::StartContainer {
                    key: "demo".to_string(),
                },
            ),
            FlowStep::poll_until(
                "wait_exit",
                PollCondition::ContainerInState {
                    key: "demo".to_string(),
                    state: ContainerState::Exited,
                },
                Duration::from_millis(200),
                10,
                "終了を確認できませんでした",
            ),
            FlowStep::cleanup("teardown", Vec::new()),
        ]);

        assert!(flow.validate().is_ok());
    }

    /// 未作成キーへの参照が検出されること
    #[test]
    fn test_validate_undefined_key() {
        let flow = Flow::new("bad", "Bad", "desc", Difficulty::Beginner, "engine-api").steps(
            vec![FlowStep::action(
                "start",
                EngineAction::StartContainer {
                    key: "ghost".to_string(),
                },
            )],
        );

        let err = flow.validate().unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    /// キーの重複作成が検出されること
    #[test]
    fn test_validate_duplicate_key() {
        let flow = Flow::new("dup", "Dup", "desc", Difficulty::Beginner, "engine-api").steps(
            vec![
                create_step("demo", "ubuntu:latest"),
                create_step("demo", "alpine:latest"),
            ],
        );

        assert!(flow.validate().is_err());
    }

    /// 不正なイメージ参照が拒否されること
    #[test]
    fn test_validate_image_reference() {
        let flow = Flow::new("img", "Img", "desc", Difficulty::Beginner, "engine-api")
            .steps(vec![create_step("demo", "Ubuntu Latest!!")]);
        assert!(flow.validate().is_err());

        let ok_flow = Flow::new("img2", "Img2", "desc", Difficulty::Beginner, "engine-api")
            .steps(vec![
                create_step("a", "registry.example.com/team/app:1.0"),
                FlowStep::cleanup("teardown", Vec::new()),
            ]);
        assert!(ok_flow.validate().is_ok());
    }

    /// 不正な正規表現が検出されること
    #[test]
    fn test_validate_broken_regex() {
        let flow = Flow::new("rx", "Rx", "desc", Difficulty::Intermediate, "pattern-watch")
            .steps(vec![
                create_step("demo", "ubuntu:latest"),
                FlowStep::wait_for_patterns(
                    "watch",
                    "demo",
                    vec![PatternSpec::regex("curl ([0-9.+", Duration::from_secs(5))],
                ),
            ]);

        assert!(flow.validate().is_err());
    }

    /// フロー ID の命名規則
    #[test]
    fn test_validate_flow_id() {
        let flow = Flow::new(
            "Hello World",
            "x",
            "desc",
            Difficulty::Beginner,
            "engine-api",
        )
        .steps(vec![create_step("demo", "ubuntu:latest")]);
        assert!(flow.validate().is_err());
    }

    #[test]
    fn test_summary_fields() {
        let flow = Flow::new(
            "hello_world",
            "Hello World",
            "最初の 1 コンテナ",
            Difficulty::Beginner,
            "engine-api",
        );
        let summary = flow.summary();
        assert_eq!(summary.id, "hello_world");
        assert_eq!(summary.name, "Hello World");
        assert_eq!(summary.difficulty, Difficulty::Beginner);
    }

    #[test]
    fn test_difficulty_serialize() {
        let json = serde_json::to_string(&Difficulty::Intermediate).unwrap();
        assert_eq!(json, "\"intermediate\"");
    }
}
