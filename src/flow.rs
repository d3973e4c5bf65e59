//! フロー定義レイヤ
//!
//! # 責務
//!
//! 「何をするか」を宣言的に表すデータ構造を提供します。ここには
//! 実行ロジックはなく、フローは `FlowStep` の列として表現されます。
//! 実際の解釈と実行は `engine` モジュールが担います。
//!
//! - [`definition`] : フロー本体とその検証
//! - [`step`] : ステップ種別とエンジン操作の語彙
//! - [`builtin`] : 組み込みの教材フローカタログ
//! - [`registry`] : 名前からフローを引く読み取り専用レジストリ

pub mod builtin;
pub mod definition;
pub mod registry;
pub mod step;

pub use definition::{Difficulty, Flow, FlowSummary};
pub use registry::FlowRegistry;
pub use step::{EngineAction, FlowStep, MatchRule, PatternSpec, PollCondition, StepKind};
