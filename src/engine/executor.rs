//! フロー実行エンジン
//!
//! # 責務
//!
//! - レジストリから取得したフロー定義の、宣言順でのステップ実行
//! - ステップ種別（エンジン操作 / パターン待機 / ポーリング / クリーンアップ）の解釈
//! - ステップタイムアウトと協調的キャンセルの適用
//! - 実行終了時の暗黙クリーンアップ（追跡リソースの逆順解放）
//! - [`FlowResult`] への結果集約
//!
//! # 実行モデル
//!
//! 1 回の実行は `Pending -> Running -> {Succeeded | Failed | TimedOut | Cancelled}`
//! と進む状態機械で、終端状態から先はありません。必須ステップが失敗すると
//! 後続の通常ステップはスキップされますが、クリーンアップステップだけは
//! 実行されます。どの経路をたどっても、最後に追跡中の全リソースへの
//! 暗黙クリーンアップが走ります。
//!
//! 呼び出し側へ `Err` が返るのは [`ExecutionError::UnknownFlow`] だけです。
//! ステップ内で起きた失敗はすべて [`FlowResult`] のステップ診断に
//! 畳み込まれます。
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
//! let result = flows.execute("hello_world", HashMap::new()).await?;
//! println!("{}", result.to_json()?);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use regex::Regex;
use tokio::time::{Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::engine::context::{ExecutionContext, ResourceHandle};
use crate::engine::result::{
    ExecutionError, FlowResult, FlowStatus, MatchOutcome, MatchStatus, StepResult, StepStatus,
};
use crate::engine::watcher;
use crate::flow::FlowRegistry;
use crate::flow::step::{EngineAction, FlowStep, MatchRule, PatternSpec, PollCondition, StepKind};
use crate::runtime::{
    ContainerEngine, ContainerHandle, ContainerSpec, ContainerState, NetworkHandle, VolumeHandle,
    explain_exit_code,
};

/// フロー実行エンジン
///
/// レジストリとコンテナエンジンクライアント、実行設定を束ねた実行の
/// 入口です。実行ごとの状態は [`ExecutionContext`] に閉じているため、
/// 1 つの `FlowEngine` を複数の並行実行で共有できます。
pub struct FlowEngine {
    /// 実行できるフローのカタログ
    registry: FlowRegistry,

    /// コンテナエンジンクライアント
    engine: Arc<dyn ContainerEngine>,

    /// タイムアウトや命名規則などの実行設定
    settings: Settings,
}

impl FlowEngine {
    /// フロー実行エンジンを構築する
    pub fn new(
        registry: FlowRegistry,
        engine: Arc<dyn ContainerEngine>,
        settings: Settings,
    ) -> Self {
        Self {
            registry,
            engine,
            settings,
        }
    }

    /// フローカタログへの参照
    pub fn registry(&self) -> &FlowRegistry {
        &self.registry
    }

    /// フローを実行する
    ///
    /// # 引数
    ///
    /// - `flow_name`: レジストリ上のフロー ID
    /// - `params`: フローのデフォルトパラメータを上書きする値
    ///
    /// # 戻り値
    ///
    /// - `Ok(FlowResult)`: 実行結果（失敗やタイムアウトもここに含まれる）
    /// - `Err(ExecutionError::UnknownFlow)`: フロー名が未登録。リソースは
    ///   一切作成されません
    pub async fn execute(
        &self,
        flow_name: &str,
        params: HashMap<String, String>,
    ) -> Result<FlowResult, ExecutionError> {
        self.execute_with_cancel(flow_name, params, CancellationToken::new())
            .await
    }

    /// キャンセルトークン付きでフローを実行する
    ///
    /// トークンが取り消されると、実行中のステップは中断され、残りの
    /// ステップはスキップされます。その場合も追跡済みリソースの解放は
    /// 必ず実施され、結果は [`FlowStatus::Cancelled`] になります。
    pub async fn execute_with_cancel(
        &self,
        flow_name: &str,
        params: HashMap<String, String>,
        cancel: CancellationToken,
    ) -> Result<FlowResult, ExecutionError> {
        let flow = self
            .registry
            .get(flow_name)
            .ok_or_else(|| ExecutionError::UnknownFlow(flow_name.to_string()))?;

        // 呼び出し側の指定がデフォルト値を上書きする
        let mut merged = flow.defaults.clone();
        merged.extend(params);

        let mut context = ExecutionContext::new(&flow.name, &self.settings);
        let run_id = context.run_id().to_string();
        let start_time = context.start_time();
        info!(flow = %flow.name, run_id = %run_id, "フロー実行を開始します");

        let mut steps: Vec<StepResult> = Vec::with_capacity(flow.steps.len());
        let mut halt: Option<(StepStatus, String)> = None;
        let mut cancelled = false;

        for (index, step) in flow.steps.iter().enumerate() {
            if cancelled {
                steps.push(StepResult::skipped(&step.name, index));
                continue;
            }
            if halt.is_some() && !step.is_cleanup() {
                debug!(step = %step.name, "先行する必須ステップの失敗によりスキップします");
                steps.push(StepResult::skipped(&step.name, index));
                continue;
            }

            let budget = step.timeout.unwrap_or(self.settings.step_timeout);
            let outcome = tokio::select! {
                _ = cancel.cancelled() => None,
                finished = timeout(budget, self.run_step(step, index, &mut context, &merged)) => {
                    Some(match finished {
                        Ok(result) => result,
                        Err(_) => timed_out_step(step, index, budget),
                    })
                }
            };

            let Some(result) = outcome else {
                info!(step = %step.name, "キャンセル要求を受けました");
                cancelled = true;
                steps.push(StepResult::skipped(&step.name, index));
                continue;
            };

            // 最初の必須失敗がフローの報告対象。後続のクリーンアップ失敗で
            // 上書きしない
            if step.required
                && halt.is_none()
                && matches!(result.status, StepStatus::Failed | StepStatus::TimedOut)
            {
                let message = result
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("ステップ \"{}\" が失敗しました", step.name));
                halt = Some((result.status, message));
            }
            steps.push(result);
        }

        // どの経路をたどってもここへ来る。台帳に残ったリソースを逆順で解放する
        let release_warnings = context.release_all(self.engine.as_ref()).await;
        for warning in &release_warnings {
            warn!(flow = %flow.name, run_id = %run_id, %warning, "暗黙クリーンアップで警告");
        }

        let end_time = SystemTime::now();
        let total_duration = end_time
            .duration_since(start_time)
            .unwrap_or(Duration::ZERO);

        let (status, error) = if cancelled {
            (
                FlowStatus::Cancelled,
                Some("実行が呼び出し側によってキャンセルされました".to_string()),
            )
        } else {
            match halt {
                Some((StepStatus::TimedOut, message)) => (FlowStatus::TimedOut, Some(message)),
                Some((_, message)) => (FlowStatus::Failed, Some(message)),
                None => (FlowStatus::Succeeded, None),
            }
        };

        // 成功時は教材ノート、それ以外はデバッグのヒントを添える
        let notes = match status {
            FlowStatus::Succeeded => flow.notes.clone(),
            _ => debugging_tips(status, &steps),
        };

        let result = FlowResult {
            flow_name: flow.name.clone(),
            run_id,
            success: matches!(status, FlowStatus::Succeeded),
            status,
            steps,
            start_time,
            end_time,
            total_duration,
            notes,
            error,
        };

        info!(
            flow = %result.flow_name,
            run_id = %result.run_id,
            status = ?result.status,
            duration = ?result.total_duration,
            "フロー実行が終了しました"
        );
        Ok(result)
    }

    /// 1 ステップを実行して診断付きの結果にまとめる
    ///
    /// ステップ内の失敗はここで [`StepResult`] に畳み込まれ、`Err` として
    /// 上へ漏れることはありません。
    async fn run_step(
        &self,
        step: &FlowStep,
        index: usize,
        context: &mut ExecutionContext,
        params: &HashMap<String, String>,
    ) -> StepResult {
        info!(step = %step.name, index, "ステップを開始します");
        let started = Instant::now();

        let payload = match &step.kind {
            StepKind::Action(action) => self
                .run_action(action, context, params)
                .await
                .unwrap_or_else(StepPayload::failed),
            StepKind::WaitForPattern { source, patterns } => self
                .run_watch(source, patterns, context)
                .await
                .unwrap_or_else(StepPayload::failed),
            StepKind::PollUntil {
                condition,
                interval,
                max_attempts,
                exhausted_message,
            } => self
                .run_poll(
                    condition,
                    *interval,
                    *max_attempts,
                    exhausted_message,
                    context,
                    params,
                )
                .await
                .unwrap_or_else(StepPayload::failed),
            StepKind::Cleanup { resources } => self.run_cleanup(resources, context).await,
        };

        let duration = started.elapsed();
        let (status, error, hint) = match &payload.failure {
            None => (StepStatus::Succeeded, None, None),
            Some(e) => {
                warn!(step = %step.name, error = %e, "ステップが失敗しました");
                (StepStatus::Failed, Some(e.to_string()), hint_for(e))
            }
        };

        StepResult {
            step_name: step.name.clone(),
            index,
            status,
            output: payload.output,
            warnings: payload.warnings,
            patterns: payload.patterns,
            duration,
            error,
            hint,
        }
    }

    /// エンジン操作ステップの実行
    async fn run_action(
        &self,
        action: &EngineAction,
        context: &mut ExecutionContext,
        params: &HashMap<String, String>,
    ) -> Result<StepPayload, ExecutionError> {
        match action {
            EngineAction::CreateContainer { key, spec } => {
                let materialized = materialize_container_spec(key, spec, context, params)?;
                info!(image = %materialized.image, name = %materialized.name, "コンテナを作成します");
                let handle = self.engine.create_container(&materialized).await?;
                let name = handle.name.clone();
                context.track(key.clone(), ResourceHandle::Container(handle));
                Ok(StepPayload::with_output(format!(
                    "コンテナ \"{}\" を作成しました",
                    name
                )))
            }
            EngineAction::StartContainer { key } => {
                let handle = require_container(context, key)?;
                self.engine.start_container(handle).await?;
                Ok(StepPayload::with_output(format!(
                    "コンテナ \"{}\" を開始しました",
                    handle.name
                )))
            }
            EngineAction::StopContainer { key } => {
                let handle = require_container(context, key)?;
                self.engine.stop_container(handle).await?;
                Ok(StepPayload::with_output(format!(
                    "コンテナ \"{}\" を停止しました",
                    handle.name
                )))
            }
            EngineAction::RemoveContainer { key } => {
                let handle = require_container(context, key)?.clone();
                self.engine.remove_container(&handle).await?;
                // 明示的に消したものは暗黙クリーンアップの対象から外す
                context.untrack(key);
                Ok(StepPayload::with_output(format!(
                    "コンテナ \"{}\" を削除しました",
                    handle.name
                )))
            }
            EngineAction::FetchLogs { key } => {
                let handle = require_container(context, key)?;
                let mut stream = self
                    .engine
                    .stream_logs(handle, Some(self.settings.log_tail))
                    .await?;
                let mut lines = Vec::new();
                while let Some(line) = stream.next_line().await {
                    lines.push(line);
                }
                Ok(StepPayload::with_output(lines.join("\n").trim().to_string()))
            }
            EngineAction::Exec {
                key,
                command,
                expect,
            } => {
                let handle = require_container(context, key)?;
                let rendered = render_all(command, params, context);
                debug!(container = %handle.name, command = %rendered.join(" "), "exec を実行します");
                let output = self.engine.exec(handle, &rendered).await?;
                if !output.success() {
                    return Err(ExecutionError::ExecFailed {
                        code: output.exit_code,
                        stderr: output.stderr.trim().to_string(),
                    });
                }
                if let Some(rule) = expect {
                    verify_expectation(rule, &output.stdout)?;
                }
                Ok(StepPayload::with_output(output.stdout.trim().to_string()))
            }
            EngineAction::Inspect { key } => {
                let handle = require_container(context, key)?;
                let report = self.engine.inspect_container(handle).await?;
                let mut output = format!("状態: {} ({})", report.state, report.state.explanation());
                if let Some(health) = report.health {
                    output.push_str(&format!("\nヘルス: {}", health));
                }
                if report.state == ContainerState::Exited
                    && let Some(code) = report.exit_code
                {
                    output.push_str(&format!(
                        "\n終了コード: {} ({})",
                        code,
                        explain_exit_code(code)
                    ));
                }
                Ok(StepPayload::with_output(output))
            }
            EngineAction::CreateNetwork { key, spec } => {
                let mut materialized = spec.clone();
                materialized.name = context.resource_name(key);
                materialized.labels.extend(context.labels());
                info!(name = %materialized.name, "ネットワークを作成します");
                let handle = self.engine.create_network(&materialized).await?;
                let name = handle.name.clone();
                context.track(key.clone(), ResourceHandle::Network(handle));
                Ok(StepPayload::with_output(format!(
                    "ネットワーク \"{}\" を作成しました",
                    name
                )))
            }
            EngineAction::ConnectNetwork { network, container } => {
                let net = require_network(context, network)?;
                let target = require_container(context, container)?;
                self.engine.connect_network(net, target).await?;
                Ok(StepPayload::with_output(format!(
                    "コンテナ \"{}\" をネットワーク \"{}\" に接続しました",
                    target.name, net.name
                )))
            }
            EngineAction::CreateVolume { key, spec } => {
                let mut materialized = spec.clone();
                materialized.name = context.resource_name(key);
                materialized.labels.extend(context.labels());
                info!(name = %materialized.name, "ボリュームを作成します");
                let handle = self.engine.create_volume(&materialized).await?;
                let name = handle.name.clone();
                context.track(key.clone(), ResourceHandle::Volume(handle));
                Ok(StepPayload::with_output(format!(
                    "ボリューム \"{}\" を作成しました",
                    name
                )))
            }
        }
    }

    /// パターン待機ステップの実行
    ///
    /// 必須パターンの取り逃しはステップ失敗、任意パターンの取り逃しは
    /// 警告として記録します。どちらの場合もパターンごとの結末は
    /// 結果に残ります。
    async fn run_watch(
        &self,
        source: &str,
        patterns: &[PatternSpec],
        context: &ExecutionContext,
    ) -> Result<StepPayload, ExecutionError> {
        let handle = require_container(context, source)?;
        // 監視はコンテナ起動時点からの全ログを対象にする
        let mut stream = self.engine.stream_logs(handle, None).await?;
        let outcomes = watcher::watch(&mut stream, patterns).await?;

        let mut warnings = Vec::new();
        let mut failure = None;
        for (spec, outcome) in patterns.iter().zip(&outcomes) {
            if outcome.status == MatchStatus::Matched {
                continue;
            }
            let reason = match outcome.status {
                MatchStatus::TimedOut => "タイムアウト",
                _ => "ストリーム終了",
            };
            if spec.required {
                if failure.is_none() {
                    failure = Some(ExecutionError::PatternMissed {
                        pattern: outcome.pattern.clone(),
                        reason,
                    });
                }
            } else {
                warnings.push(format!(
                    "任意パターン \"{}\" は検出できませんでした（{}）",
                    outcome.pattern, reason
                ));
            }
        }

        let matched = outcomes
            .iter()
            .filter(|o| o.status == MatchStatus::Matched)
            .count();
        Ok(StepPayload {
            output: Some(format!(
                "{}/{} パターンを検出しました",
                matched,
                outcomes.len()
            )),
            warnings,
            patterns: outcomes,
            failure,
        })
    }

    /// ポーリングステップの実行
    ///
    /// 条件確認のエラーは原則として再試行で吸収します。リソース不在や
    /// デーモン未到達のような回復見込みのないものだけ即座に失敗します。
    async fn run_poll(
        &self,
        condition: &PollCondition,
        interval: Duration,
        max_attempts: u32,
        exhausted_message: &str,
        context: &ExecutionContext,
        params: &HashMap<String, String>,
    ) -> Result<StepPayload, ExecutionError> {
        for attempt in 1..=max_attempts {
            match self.check_condition(condition, context, params).await {
                Ok(true) => {
                    debug!(attempt, "ポーリング条件が成立しました");
                    return Ok(StepPayload::with_output(format!(
                        "{}（試行 {} 回目で成立）",
                        condition.describe(),
                        attempt
                    )));
                }
                Ok(false) => {
                    debug!(attempt, max_attempts, "条件は未成立です");
                }
                Err(e) if poll_is_fatal(&e) => return Err(e),
                Err(e) => {
                    debug!(attempt, error = %e, "条件確認に失敗しました。再試行します");
                }
            }
            if attempt < max_attempts {
                sleep(interval).await;
            }
        }

        Err(ExecutionError::PollExhausted {
            message: exhausted_message.to_string(),
        })
    }

    /// ポーリング条件の 1 回分の判定
    async fn check_condition(
        &self,
        condition: &PollCondition,
        context: &ExecutionContext,
        params: &HashMap<String, String>,
    ) -> Result<bool, ExecutionError> {
        match condition {
            PollCondition::ExecOutputContains {
                key,
                command,
                needle,
            } => {
                let handle = require_container(context, key)?;
                let rendered = render_all(command, params, context);
                let output = self.engine.exec(handle, &rendered).await?;
                // pg_isready のように標準エラー側へ出力するコマンドもある
                Ok(output.stdout.contains(needle) || output.stderr.contains(needle))
            }
            PollCondition::ContainerInState { key, state } => {
                let handle = require_container(context, key)?;
                let report = self.engine.inspect_container(handle).await?;
                Ok(report.state == *state)
            }
            PollCondition::HealthIs { key, state } => {
                let handle = require_container(context, key)?;
                let report = self.engine.inspect_container(handle).await?;
                Ok(report.health == Some(*state))
            }
        }
    }

    /// クリーンアップステップの実行
    ///
    /// 解放の失敗は警告として記録するだけで、ステップを失敗させません。
    async fn run_cleanup(
        &self,
        resources: &[String],
        context: &mut ExecutionContext,
    ) -> StepPayload {
        let before = context.len();
        let warnings = context.release(self.engine.as_ref(), resources).await;
        let released = before - context.len();
        StepPayload {
            output: Some(format!("{} 件のリソースを解放しました", released)),
            warnings,
            patterns: Vec::new(),
            failure: None,
        }
    }
}

/// ステップ実行の中間結果
///
/// 失敗時もそこまでに得られた出力やパターン結末を保持する必要があるため、
/// `Result` ではなく失敗を内包した形で持ち回ります。
#[derive(Debug, Default)]
struct StepPayload {
    /// ステップの主出力
    output: Option<String>,

    /// 失敗扱いにしない注意事項
    warnings: Vec<String>,

    /// パターン監視の結末（`WaitForPattern` のみ）
    patterns: Vec<MatchOutcome>,

    /// ステップを失敗させたエラー
    failure: Option<ExecutionError>,
}

impl StepPayload {
    fn with_output(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            ..Self::default()
        }
    }

    fn failed(error: ExecutionError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }
}

/// ステップタイムアウトの結果を作る
fn timed_out_step(step: &FlowStep, index: usize, budget: Duration) -> StepResult {
    let error = ExecutionError::StepTimeout {
        step_name: step.name.clone(),
        timeout_secs: budget.as_secs(),
    };
    warn!(step = %step.name, budget = ?budget, "ステップがタイムアウトしました");
    StepResult {
        step_name: step.name.clone(),
        index,
        status: StepStatus::TimedOut,
        output: None,
        warnings: Vec::new(),
        patterns: Vec::new(),
        duration: budget,
        error: Some(error.to_string()),
        hint: None,
    }
}

/// 作成仕様を実行コンテキストで現実の仕様へ確定させる
///
/// 名前の一意化、所有ラベルの付与、コマンドと環境変数のプレースホルダー
/// 展開、ネットワークとボリュームの論理キーから実名への解決を行います。
fn materialize_container_spec(
    key: &str,
    spec: &ContainerSpec,
    context: &ExecutionContext,
    params: &HashMap<String, String>,
) -> Result<ContainerSpec, ExecutionError> {
    let mut materialized = spec.clone();
    materialized.name = context.resource_name(key);
    materialized.command = render_all(&spec.command, params, context);
    materialized.env = spec
        .env
        .iter()
        .map(|(name, value)| (name.clone(), render(value, params, context)))
        .collect();
    materialized.labels.extend(context.labels());

    if let Some(network_key) = &spec.network {
        materialized.network = Some(require_network(context, network_key)?.name.clone());
    }
    for mount in &mut materialized.mounts {
        mount.source = require_volume(context, &mount.source)?.name.clone();
    }

    Ok(materialized)
}

/// プレースホルダーを展開する
///
/// `{{キー}}` はパラメータから、`{{name:キー}}` は実行中に作成された
/// リソースの実名から展開されます。どちらにも解決できないものと
/// 閉じられていないものは、原文のまま残します。
fn render(template: &str, params: &HashMap<String, String>, context: &ExecutionContext) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        let Some(close) = rest[open + 2..].find("}}") else {
            break;
        };
        rendered.push_str(&rest[..open]);
        let token = rest[open + 2..open + 2 + close].trim();
        let replacement = if let Some(key) = token.strip_prefix("name:") {
            context.name_of(key.trim()).map(str::to_string)
        } else {
            params.get(token).cloned()
        };
        match replacement {
            Some(value) => rendered.push_str(&value),
            None => rendered.push_str(&rest[open..open + 2 + close + 2]),
        }
        rest = &rest[open + 2 + close + 2..];
    }

    rendered.push_str(rest);
    rendered
}

/// コマンド引数列の各要素を展開する
fn render_all(
    templates: &[String],
    params: &HashMap<String, String>,
    context: &ExecutionContext,
) -> Vec<String> {
    templates
        .iter()
        .map(|template| render(template, params, context))
        .collect()
}

/// exec の標準出力が期待条件を満たすか検証する
fn verify_expectation(rule: &MatchRule, stdout: &str) -> Result<(), ExecutionError> {
    let matched = match rule {
        MatchRule::Exact(needle) => stdout.contains(needle),
        MatchRule::Regex(pattern) => Regex::new(pattern)?.is_match(stdout),
    };
    if matched {
        Ok(())
    } else {
        Err(ExecutionError::UnexpectedOutput(format!(
            "パターン \"{}\" が exec の出力に現れませんでした",
            rule
        )))
    }
}

/// エラーに応じた学習者向けヒント
fn hint_for(error: &ExecutionError) -> Option<String> {
    match error {
        ExecutionError::Engine(e) => e.hint().map(str::to_string),
        ExecutionError::ExecFailed { code, .. } => Some(explain_exit_code(*code).to_string()),
        _ => None,
    }
}

/// 再試行しても回復の見込みがないポーリングエラーか
fn poll_is_fatal(error: &ExecutionError) -> bool {
    match error {
        ExecutionError::MissingResource { .. } => true,
        ExecutionError::Engine(e) => e.is_unreachable(),
        _ => false,
    }
}

/// 失敗したフローに添えるデバッグのヒント
fn debugging_tips(status: FlowStatus, steps: &[StepResult]) -> Vec<String> {
    let mut tips = Vec::new();

    if let Some(failure) = steps
        .iter()
        .find(|s| matches!(s.status, StepStatus::Failed | StepStatus::TimedOut))
    {
        tips.push(format!(
            "最初の失敗はステップ \"{}\" です。error と output をここから順にたどってください",
            failure.step_name
        ));
        if let Some(hint) = &failure.hint {
            tips.push(hint.clone());
        }
    }

    match status {
        FlowStatus::TimedOut => tips.push(
            "タイムアウトは環境の遅さでも起こります。設定の execution.step_timeout_secs を延ばして再実行できます"
                .to_string(),
        ),
        FlowStatus::Cancelled => tips.push(
            "キャンセル時点までに作成されたリソースは解放済みです。同じフローをいつでも再実行できます"
                .to_string(),
        ),
        _ => {}
    }

    tips
}

fn require_container<'a>(
    context: &'a ExecutionContext,
    key: &str,
) -> Result<&'a ContainerHandle, ExecutionError> {
    context
        .container(key)
        .ok_or_else(|| ExecutionError::MissingResource {
            key: key.to_string(),
        })
}

fn require_network<'a>(
    context: &'a ExecutionContext,
    key: &str,
) -> Result<&'a NetworkHandle, ExecutionError> {
    context
        .network(key)
        .ok_or_else(|| ExecutionError::MissingResource {
            key: key.to_string(),
        })
}

fn require_volume<'a>(
    context: &'a ExecutionContext,
    key: &str,
) -> Result<&'a VolumeHandle, ExecutionError> {
    context
        .volume(key)
        .ok_or_else(|| ExecutionError::MissingResource {
            key: key.to_string(),
        })
}
