use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use container_poker::config::Settings;
use container_poker::engine::{FlowEngine, FlowStatus, MatchStatus, StepStatus};
use container_poker::error::EngineError;
use container_poker::flow::FlowRegistry;
use container_poker::runtime::{
    ContainerEngine, ContainerHandle, ContainerSpec, ContainerState, ExecOutput, InspectReport,
    LogStream, NetworkHandle, NetworkSpec, VolumeHandle, VolumeSpec,
};

/// 操作列を記録し、台本どおりの応答を返すエンジン実装
#[derive(Default)]
struct ScriptedEngine {
    ops: Mutex<Vec<String>>,
    created: Mutex<Vec<ContainerSpec>>,
    exec_results: Mutex<VecDeque<ExecOutput>>,
    inspect_results: Mutex<VecDeque<InspectReport>>,
    log_lines: Mutex<Vec<String>>,
    stall_next_stop: Mutex<bool>,
}

impl ScriptedEngine {
    fn record(&self, op: impl Into<String>) {
        self.ops.lock().unwrap().push(op.into());
    }

    fn recorded(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    fn created_specs(&self) -> Vec<ContainerSpec> {
        self.created.lock().unwrap().clone()
    }

    fn push_inspect(&self, state: ContainerState) {
        self.inspect_results.lock().unwrap().push_back(InspectReport {
            state,
            exit_code: if state == ContainerState::Exited {
                Some(0)
            } else {
                None
            },
            health: None,
        });
    }

    fn push_exec(&self, exit_code: i64, stdout: &str) {
        self.exec_results.lock().unwrap().push_back(ExecOutput {
            exit_code,
            stdout: stdout.to_string(),
            stderr: String::new(),
        });
    }

    fn set_logs(&self, lines: &[&str]) {
        *self.log_lines.lock().unwrap() = lines.iter().map(|line| line.to_string()).collect();
    }

    /// 次の stop だけ完了しないようにする（2 回目からは成功する）
    fn stall_next_stop(&self) {
        *self.stall_next_stop.lock().unwrap() = true;
    }
}

#[async_trait]
impl ContainerEngine for ScriptedEngine {
    async fn ping(&self) -> Result<String, EngineError> {
        self.record("ping");
        Ok("scripted 1.0".to_string())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerHandle, EngineError> {
        self.record(format!("create:{}", spec.name));
        self.created.lock().unwrap().push(spec.clone());
        Ok(ContainerHandle {
            id: format!("id-{}", spec.name),
            name: spec.name.clone(),
        })
    }

    async fn start_container(&self, handle: &ContainerHandle) -> Result<(), EngineError> {
        self.record(format!("start:{}", handle.name));
        Ok(())
    }

    async fn stop_container(&self, handle: &ContainerHandle) -> Result<(), EngineError> {
        self.record(format!("stop:{}", handle.name));
        if std::mem::take(&mut *self.stall_next_stop.lock().unwrap()) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn remove_container(&self, handle: &ContainerHandle) -> Result<(), EngineError> {
        self.record(format!("remove:{}", handle.name));
        Ok(())
    }

    async fn inspect_container(
        &self,
        handle: &ContainerHandle,
    ) -> Result<InspectReport, EngineError> {
        self.record(format!("inspect:{}", handle.name));
        Ok(self
            .inspect_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(InspectReport {
                state: ContainerState::Running,
                exit_code: None,
                health: None,
            }))
    }

    async fn stream_logs(
        &self,
        handle: &ContainerHandle,
        _tail: Option<u32>,
    ) -> Result<LogStream, EngineError> {
        self.record(format!("logs:{}", handle.name));
        Ok(LogStream::from_lines(self.log_lines.lock().unwrap().clone()))
    }

    async fn exec(
        &self,
        handle: &ContainerHandle,
        command: &[String],
    ) -> Result<ExecOutput, EngineError> {
        self.record(format!("exec:{}:{}", handle.name, command.join(" ")));
        Ok(self
            .exec_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ExecOutput {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            }))
    }

    async fn create_network(&self, spec: &NetworkSpec) -> Result<NetworkHandle, EngineError> {
        self.record(format!("network_create:{}", spec.name));
        Ok(NetworkHandle {
            id: format!("net-{}", spec.name),
            name: spec.name.clone(),
        })
    }

    async fn connect_network(
        &self,
        network: &NetworkHandle,
        container: &ContainerHandle,
    ) -> Result<(), EngineError> {
        self.record(format!("network_connect:{}:{}", network.name, container.name));
        Ok(())
    }

    async fn remove_network(&self, handle: &NetworkHandle) -> Result<(), EngineError> {
        self.record(format!("network_remove:{}", handle.name));
        Ok(())
    }

    async fn create_volume(&self, spec: &VolumeSpec) -> Result<VolumeHandle, EngineError> {
        self.record(format!("volume_create:{}", spec.name));
        Ok(VolumeHandle {
            name: spec.name.clone(),
        })
    }

    async fn remove_volume(&self, handle: &VolumeHandle) -> Result<(), EngineError> {
        self.record(format!("volume_remove:{}", handle.name));
        Ok(())
    }
}

fn flow_engine(mock: &Arc<ScriptedEngine>) -> FlowEngine {
    flow_engine_with(mock, Settings::default())
}

fn flow_engine_with(mock: &Arc<ScriptedEngine>, settings: Settings) -> FlowEngine {
    FlowEngine::new(
        FlowRegistry::builtin(),
        Arc::clone(mock) as Arc<dyn ContainerEngine>,
        settings,
    )
}

/// hello_world の一周: 作成 → 実行 → 終了待ち → ログ読み取り → 片付け
#[tokio::test]
async fn test_hello_world_end_to_end() {
    let mock = Arc::new(ScriptedEngine::default());
    mock.push_inspect(ContainerState::Exited);
    mock.set_logs(&["Hello from Container Poker!"]);

    let result = flow_engine(&mock)
        .execute("hello_world", HashMap::new())
        .await
        .expect("hello_world は登録済みのはず");

    assert!(result.success);
    assert_eq!(result.status, FlowStatus::Succeeded);
    assert_eq!(result.completed_steps(), 5);
    assert!(result.error.is_none());

    // デフォルトメッセージが作成時のコマンドへ展開されている
    let created = mock.created_specs();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].image, "ubuntu:latest");
    assert_eq!(created[0].command, vec!["echo", "Hello from Container Poker!"]);
    assert!(created[0].name.starts_with("cpoker-demo-"));
    assert!(
        created[0]
            .labels
            .iter()
            .any(|(k, v)| k == "created-by" && v == "containerpoker")
    );

    // ログ読み取りステップの出力が本文そのもの
    let read_logs = result
        .steps
        .iter()
        .find(|s| s.step_name == "read_logs")
        .expect("read_logs ステップがあるはず");
    assert_eq!(read_logs.output.as_deref(), Some("Hello from Container Poker!"));

    // 作成 → 開始 → 検査 → ログ → 停止 → 削除 の順
    let ops = mock.recorded();
    assert_eq!(ops.len(), 6);
    assert!(ops[0].starts_with("create:"));
    assert!(ops[1].starts_with("start:"));
    assert!(ops[2].starts_with("inspect:"));
    assert!(ops[3].starts_with("logs:"));
    assert!(ops[4].starts_with("stop:"));
    assert!(ops[5].starts_with("remove:"));

    // 成功時は学習ノートが添えられる
    assert!(!result.notes.is_empty());
}

/// 片付けステップが停止待ちのままタイムアウトしても、コンテナは
/// 最終解放パスで必ず削除されること
#[tokio::test(start_paused = true)]
async fn test_cleanup_interruption_still_releases_the_container() {
    let mock = Arc::new(ScriptedEngine::default());
    mock.push_inspect(ContainerState::Exited);
    mock.set_logs(&["Hello from Container Poker!"]);
    mock.stall_next_stop();

    let settings = Settings {
        step_timeout: Duration::from_secs(1),
        ..Settings::default()
    };
    let result = flow_engine_with(&mock, settings)
        .execute("hello_world", HashMap::new())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.status, FlowStatus::TimedOut);
    assert_eq!(result.completed_steps(), 4);
    assert_eq!(result.steps.last().unwrap().status, StepStatus::TimedOut);

    // 停止は二度試みられるが、削除は 1 回だけ
    let ops = mock.recorded();
    assert_eq!(ops.iter().filter(|op| op.starts_with("stop:")).count(), 2);
    let removes: Vec<&String> = ops.iter().filter(|op| op.starts_with("remove:")).collect();
    assert_eq!(removes.len(), 1);
    assert!(removes[0].starts_with("remove:cpoker-demo-"));
}

/// パラメータ上書きと、実行ごとのリソース名の一意性
#[tokio::test]
async fn test_parameter_override_and_unique_names() {
    let mock = Arc::new(ScriptedEngine::default());
    let flows = flow_engine(&mock);

    let mut params = HashMap::new();
    params.insert("message".to_string(), "カスタムメッセージ".to_string());

    mock.push_inspect(ContainerState::Exited);
    let first = flows.execute("hello_world", params).await.unwrap();
    mock.push_inspect(ContainerState::Exited);
    let second = flows.execute("hello_world", HashMap::new()).await.unwrap();

    assert!(first.success);
    assert!(second.success);
    assert_ne!(first.run_id, second.run_id);

    let created = mock.created_specs();
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].command, vec!["echo", "カスタムメッセージ"]);
    // 上書きしない実行はデフォルトへ戻る
    assert_eq!(created[1].command, vec!["echo", "Hello from Container Poker!"]);
    // 同じフローでも実行が違えば名前は衝突しない
    assert_ne!(created[0].name, created[1].name);
}

/// multi_container: DB が準備完了にならなければアプリは作られず、
/// それでも作成済みリソースは逆順で片付くこと
#[tokio::test(start_paused = true)]
async fn test_multi_container_db_never_ready() {
    let mock = Arc::new(ScriptedEngine::default());
    // exec の台本は空のまま: pg_isready の出力は何も含まない

    let result = flow_engine(&mock)
        .execute("multi_container", HashMap::new())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.status, FlowStatus::Failed);
    assert_eq!(result.error.as_deref(), Some("Database failed to start"));

    let statuses: Vec<StepStatus> = result.steps.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![
            StepStatus::Succeeded, // create_network
            StepStatus::Succeeded, // create_database
            StepStatus::Succeeded, // start_database
            StepStatus::Failed,    // wait_database_ready
            StepStatus::Skipped,   // create_application
            StepStatus::Skipped,   // start_application
            StepStatus::Skipped,   // verify_connectivity
            StepStatus::Succeeded, // teardown
        ]
    );

    let ops = mock.recorded();

    // アプリケーションコンテナには一切手を付けていない
    assert!(!ops.iter().any(|op| op.contains("cpoker-app-")));

    // readiness ポーリングは上限まで試行される
    let polls = ops.iter().filter(|op| op.starts_with("exec:")).count();
    assert_eq!(polls, 30);

    // 片付けは作成の逆順: DB コンテナを消してからネットワーク
    let remove_db = ops
        .iter()
        .position(|op| op.starts_with("remove:cpoker-db-"))
        .expect("DB コンテナが削除されるはず");
    let remove_net = ops
        .iter()
        .position(|op| op.starts_with("network_remove:cpoker-net-"))
        .expect("ネットワークが削除されるはず");
    assert!(remove_db < remove_net);

    // 失敗時はデバッグのヒントが添えられる
    assert!(
        result
            .notes
            .iter()
            .any(|tip| tip.contains("wait_database_ready"))
    );
}

/// log_monitoring: マイルストーンの検出結果がステップ診断に残ること
#[tokio::test]
async fn test_log_monitoring_detects_milestones() {
    let mock = Arc::new(ScriptedEngine::default());
    let lines: Vec<String> = (1..=10).map(|i| format!("Log entry {}", i)).collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    mock.set_logs(&refs);

    let result = flow_engine(&mock)
        .execute("log_monitoring", HashMap::new())
        .await
        .unwrap();

    assert!(result.success);

    let watch = result
        .steps
        .iter()
        .find(|s| s.step_name == "watch_milestones")
        .expect("監視ステップがあるはず");
    assert_eq!(watch.status, StepStatus::Succeeded);
    assert_eq!(watch.patterns.len(), 4);
    assert!(watch.patterns.iter().all(|p| p.status == MatchStatus::Matched));
    assert_eq!(
        watch.patterns[0].matched_line.as_deref(),
        Some("Log entry 3")
    );
    assert_eq!(watch.output.as_deref(), Some("4/4 パターンを検出しました"));
}

/// volume_management: 論理キーのマウント元が実ボリューム名に解決され、
/// ボリュームは全コンテナの削除後に消えること
#[tokio::test]
async fn test_volume_management_resolves_mounts_and_cleans_up_last() {
    let mock = Arc::new(ScriptedEngine::default());
    // writer の終了確認
    mock.push_inspect(ContainerState::Exited);
    // reader のログに永続化したデータが現れる
    mock.set_logs(&["Persistent data example", "Thu Jan  1 00:00:00 UTC 2026"]);

    let result = flow_engine(&mock)
        .execute("volume_management", HashMap::new())
        .await
        .unwrap();

    assert!(result.success, "失敗: {:?}", result.error);

    // マウント元は実行時のボリューム名へ解決される
    let created = mock.created_specs();
    assert_eq!(created.len(), 2);
    for spec in &created {
        assert!(spec.mounts[0].source.starts_with("cpoker-data-"));
    }
    // 読み取り側だけが read_only
    assert!(!created[0].mounts[0].read_only);
    assert!(created[1].mounts[0].read_only);

    // ボリュームの削除は最後
    let ops = mock.recorded();
    assert!(ops[0].starts_with("volume_create:cpoker-data-"));
    assert!(ops.last().unwrap().starts_with("volume_remove:cpoker-data-"));
    let container_removals = ops
        .iter()
        .filter(|op| op.starts_with("remove:"))
        .count();
    assert_eq!(container_removals, 2);
}
