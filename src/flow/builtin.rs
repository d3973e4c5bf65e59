//! 組み込みの教材フローカタログ
//!
//! # 責務
//!
//! コンテナオーケストレーションの代表的なパターンを 8 つのフローとして
//! 定義します。各フローは `FlowStep` の宣言だけで構成され、固有の
//! 実行コードを持ちません。
//!
//! | フロー | 難易度 | 題材 |
//! |--------|--------|------|
//! | `hello_world` | beginner | 単一コンテナのライフサイクル |
//! | `interactive_shell` | beginner | TTY 付きコンテナと exec |
//! | `automated_commands` | intermediate | exec によるコマンド自動化 |
//! | `multi_container` | intermediate | 依存関係のある複数コンテナ起動 |
//! | `log_monitoring` | intermediate | ログのパターン監視 |
//! | `health_recovery` | advanced | ヘルスチェックと障害シミュレーション |
//! | `networking` | advanced | ネットワーク分離と接続 |
//! | `volume_management` | intermediate | ボリュームによるデータ永続化 |
//!
//! リソース名はすべて論理キーで宣言し、実行時に一意な名前へ
//! 変換されます。`{{name:キー}}` は実行時のリソース名に、
//! `{{パラメータ名}}` は実行パラメータに展開されます。

use std::time::Duration;

use super::definition::{Difficulty, Flow};
use super::step::{EngineAction, FlowStep, MatchRule, PatternSpec, PollCondition};
use crate::runtime::{
    ContainerSpec, ContainerState, HealthState, HealthcheckSpec, MountSpec, NetworkSpec,
    PortMapping, VolumeSpec,
};

/// `hello_world` のデフォルトメッセージ
pub const HELLO_WORLD_MESSAGE: &str = "Hello from Container Poker!";

/// `multi_container` の readiness 失敗メッセージ
pub const DB_START_FAILURE_MESSAGE: &str = "Database failed to start";

/// 組み込みフローを登録順で返す
pub fn builtin_flows() -> Vec<Flow> {
    vec![
        hello_world(),
        interactive_shell(),
        automated_commands(),
        multi_container(),
        log_monitoring(),
        health_recovery(),
        networking(),
        volume_management(),
    ]
}

/// 文字列スライスを `Vec<String>` へ
fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// 環境変数ペア
fn env(key: &str, value: &str) -> (String, String) {
    (key.to_string(), value.to_string())
}

/// コンテナの終了を待つポーリングステップ
fn wait_for_exit(name: &str, key: &str) -> FlowStep {
    FlowStep::poll_until(
        name,
        PollCondition::ContainerInState {
            key: key.to_string(),
            state: ContainerState::Exited,
        },
        Duration::from_millis(500),
        60,
        format!("コンテナ \"{}\" の終了を確認できませんでした", key),
    )
}

fn hello_world() -> Flow {
    Flow::new(
        "hello_world",
        "Hello World",
        "コンテナを 1 つ作成して実行し、出力を読み取って片付ける最初の一歩",
        Difficulty::Beginner,
        "engine-api",
    )
    .default_param("message", HELLO_WORLD_MESSAGE)
    .steps(vec![
        FlowStep::action(
            "create_container",
            EngineAction::CreateContainer {
                key: "demo".to_string(),
                spec: ContainerSpec {
                    image: "ubuntu:latest".to_string(),
                    command: args(&["echo", "{{message}}"]),
                    ..ContainerSpec::default()
                },
            },
        ),
        FlowStep::action(
            "start_container",
            EngineAction::StartContainer {
                key: "demo".to_string(),
            },
        ),
        wait_for_exit("wait_for_completion", "demo"),
        FlowStep::action(
            "read_logs",
            EngineAction::FetchLogs {
                key: "demo".to_string(),
            },
        ),
        FlowStep::cleanup("remove_container", Vec::new()),
    ])
    .notes(vec![
        "コンテナは隔離されたプロセスです。echo が終了するとコンテナも終了します",
        "ログはコンテナの終了後も読み取れます",
        "作成したリソースは必ず削除するまでがライフサイクルです",
    ])
}

fn interactive_shell() -> Flow {
    Flow::new(
        "interactive_shell",
        "Interactive Shell",
        "TTY 付きでシェルコンテナを起動し、exec でコマンドを送り込む",
        Difficulty::Beginner,
        "tty",
    )
    .steps(vec![
        FlowStep::action(
            "create_shell",
            EngineAction::CreateContainer {
                key: "shell".to_string(),
                spec: ContainerSpec {
                    image: "ubuntu:latest".to_string(),
                    command: args(&["/bin/bash"]),
                    tty: true,
                    open_stdin: true,
                    ..ContainerSpec::default()
                },
            },
        ),
        FlowStep::action(
            "start_shell",
            EngineAction::StartContainer {
                key: "shell".to_string(),
            },
        ),
        FlowStep::action(
            "confirm_running",
            EngineAction::Inspect {
                key: "shell".to_string(),
            },
        ),
        FlowStep::action(
            "exec_greeting",
            EngineAction::Exec {
                key: "shell".to_string(),
                command: args(&["echo", "Hello from interactive session!"]),
                expect: Some(MatchRule::Exact(
                    "Hello from interactive session!".to_string(),
                )),
            },
        ),
        FlowStep::cleanup("remove_shell", Vec::new()),
    ])
    .notes(vec![
        "TTY と標準入力を開いたままにすると、シェルは入力待ちで生き続けます",
        "`docker exec -it <名前> bash` で同じコンテナに接続できます",
        "試すと良いコマンド: ls -la / echo / ps aux / exit",
    ])
}

fn automated_commands() -> Flow {
    Flow::new(
        "automated_commands",
        "Automated Commands",
        "長命コンテナに exec でコマンド列を流し込み、出力を検証しながら自動化する",
        Difficulty::Intermediate,
        "exec",
    )
    .steps(vec![
        FlowStep::action(
            "create_workspace",
            EngineAction::CreateContainer {
                key: "workspace".to_string(),
                spec: ContainerSpec {
                    image: "ubuntu:latest".to_string(),
                    command: args(&["/bin/bash"]),
                    tty: true,
                    open_stdin: true,
                    ..ContainerSpec::default()
                },
            },
        ),
        FlowStep::action(
            "start_workspace",
            EngineAction::StartContainer {
                key: "workspace".to_string(),
            },
        ),
        FlowStep::action(
            "write_marker_file",
            EngineAction::Exec {
                key: "workspace".to_string(),
                command: args(&[
                    "bash",
                    "-c",
                    "echo 'Automation successful!' > /tmp/test.txt",
                ]),
                expect: None,
            },
        ),
        FlowStep::action(
            "verify_marker_file",
            EngineAction::Exec {
                key: "workspace".to_string(),
                command: args(&["cat", "/tmp/test.txt"]),
                expect: Some(MatchRule::Exact("Automation successful!".to_string())),
            },
        ),
        FlowStep::action(
            "capture_bash_version",
            EngineAction::Exec {
                key: "workspace".to_string(),
                command: args(&["bash", "--version"]),
                expect: Some(MatchRule::Regex(
                    r"GNU bash, version ([0-9.]+)".to_string(),
                )),
            },
        ),
        FlowStep::cleanup("remove_workspace", Vec::new()),
    ])
    .notes(vec![
        "exec は実行中のコンテナに追加プロセスを立ち上げます",
        "出力への期待値を宣言しておくと、自動化の成否を機械的に判定できます",
        "正規表現のキャプチャでバージョン番号などの値を抜き出せます",
        "同じ方式で apt-get などのパッケージ導入も自動化できます",
    ])
}

fn multi_container() -> Flow {
    Flow::new(
        "multi_container",
        "Multi-Container Orchestration",
        "データベースの準備完了を待ってからアプリケーションを起動する依存関係パターン",
        Difficulty::Intermediate,
        "readiness-poll",
    )
    .steps(vec![
        FlowStep::action(
            "create_network",
            EngineAction::CreateNetwork {
                key: "net".to_string(),
                spec: NetworkSpec {
                    driver: "bridge".to_string(),
                    ..NetworkSpec::default()
                },
            },
        ),
        FlowStep::action(
            "create_database",
            EngineAction::CreateContainer {
                key: "db".to_string(),
                spec: ContainerSpec {
                    image: "postgres:alpine".to_string(),
                    env: vec![
                        env("POSTGRES_PASSWORD", "secretpass"),
                        env("POSTGRES_DB", "demoapp"),
                    ],
                    network: Some("net".to_string()),
                    ..ContainerSpec::default()
                },
            },
        ),
        FlowStep::action(
            "start_database",
            EngineAction::StartContainer {
                key: "db".to_string(),
            },
        ),
        FlowStep::poll_until(
            "wait_database_ready",
            PollCondition::ExecOutputContains {
                key: "db".to_string(),
                command: args(&["pg_isready", "-U", "postgres"]),
                needle: "accepting connections".to_string(),
            },
            Duration::from_secs(1),
            30,
            DB_START_FAILURE_MESSAGE,
        ),
        FlowStep::action(
            "create_application",
            EngineAction::CreateContainer {
                key: "app".to_string(),
                spec: ContainerSpec {
                    image: "nginx:alpine".to_string(),
                    env: vec![env("DB_HOST", "{{name:db}}"), env("DB_NAME", "demoapp")],
                    network: Some("net".to_string()),
                    ports: vec![PortMapping {
                        host: 8080,
                        container: 80,
                    }],
                    ..ContainerSpec::default()
                },
            },
        ),
        FlowStep::action(
            "start_application",
            EngineAction::StartContainer {
                key: "app".to_string(),
            },
        ),
        FlowStep::action(
            "verify_connectivity",
            EngineAction::Exec {
                key: "app".to_string(),
                command: args(&["ping", "-c", "1", "{{name:db}}"]),
                // 先頭の空白がないと "100% packet loss" にも部分一致してしまう
                expect: Some(MatchRule::Exact(" 0% packet loss".to_string())),
            },
        ),
        FlowStep::cleanup("teardown", Vec::new()),
    ])
    .notes(vec![
        "依存先の「準備完了」は起動完了と同じではありません。pg_isready のような確認が必要です",
        "同一ネットワーク上のコンテナは、コンテナ名を DNS 名として相互に解決できます",
        "クリーンアップは作成の逆順です。ネットワークは接続中のコンテナを先に消してから削除します",
    ])
}

fn log_monitoring() -> Flow {
    let pattern_timeout = Duration::from_secs(15);
    Flow::new(
        "log_monitoring",
        "Log Monitoring",
        "実行中コンテナのログを追跡し、マイルストーンの出現を順に検出する",
        Difficulty::Intermediate,
        "pattern-watch",
    )
    .steps(vec![
        FlowStep::action(
            "create_logger",
            EngineAction::CreateContainer {
                key: "logger".to_string(),
                spec: ContainerSpec {
                    image: "ubuntu:latest".to_string(),
                    command: args(&[
                        "bash",
                        "-c",
                        "for i in {1..10}; do echo Log entry $i; sleep 1; done",
                    ]),
                    ..ContainerSpec::default()
                },
            },
        ),
        FlowStep::action(
            "start_logger",
            EngineAction::StartContainer {
                key: "logger".to_string(),
            },
        ),
        FlowStep::wait_for_patterns(
            "watch_milestones",
            "logger",
            vec![
                PatternSpec::exact("Log entry 3", pattern_timeout).optional(),
                PatternSpec::exact("Log entry 5", pattern_timeout).optional(),
                PatternSpec::exact("Log entry 8", pattern_timeout).optional(),
                PatternSpec::exact("Log entry 10", pattern_timeout).optional(),
            ],
        ),
        FlowStep::cleanup("remove_logger", Vec::new()),
    ])
    .notes(vec![
        "Log entry 3 = 30% 地点、5 = 折り返し、8 = 終盤、10 = 完了のマイルストーンです",
        "各パターンのタイムアウトは、そのパターンの待機を始めた時点から計測されます",
        "1 つのパターンを取り逃しても監視は次のパターンへ続行します",
    ])
}

fn health_recovery() -> Flow {
    Flow::new(
        "health_recovery",
        "Health Check & Recovery",
        "ヘルスチェック付きコンテナで障害をシミュレートし、状態遷移を観察する",
        Difficulty::Advanced,
        "healthcheck",
    )
    .steps(vec![
        FlowStep::action(
            "create_web",
            EngineAction::CreateContainer {
                key: "web".to_string(),
                spec: ContainerSpec {
                    image: "nginx:alpine".to_string(),
                    healthcheck: Some(HealthcheckSpec {
                        test: args(&["wget", "-q", "--spider", "http://localhost/"]),
                        interval: Duration::from_secs(5),
                        timeout: Duration::from_secs(3),
                        retries: 3,
                        start_period: Duration::from_secs(10),
                    }),
                    restart_policy: Some("on-failure:3".to_string()),
                    ..ContainerSpec::default()
                },
            },
        ),
        FlowStep::action(
            "start_web",
            EngineAction::StartContainer {
                key: "web".to_string(),
            },
        ),
        FlowStep::poll_until(
            "wait_until_healthy",
            PollCondition::HealthIs {
                key: "web".to_string(),
                state: HealthState::Healthy,
            },
            Duration::from_secs(3),
            10,
            "ヘルスチェックが healthy になりませんでした",
        )
        .optional(),
        FlowStep::action(
            "simulate_failure",
            EngineAction::Exec {
                key: "web".to_string(),
                command: args(&["nginx", "-s", "stop"]),
                expect: None,
            },
        ),
        FlowStep::poll_until(
            "observe_recovery",
            PollCondition::ContainerInState {
                key: "web".to_string(),
                state: ContainerState::Running,
            },
            Duration::from_secs(3),
            5,
            "再起動ポリシーによる復旧は観測されませんでした",
        )
        .optional(),
        FlowStep::action(
            "final_state",
            EngineAction::Inspect {
                key: "web".to_string(),
            },
        ),
        FlowStep::cleanup("remove_web", Vec::new()),
    ])
    .notes(vec![
        "ヘルスチェックは starting → healthy / unhealthy と遷移します",
        "`on-failure` ポリシーは非ゼロ終了のときだけ再起動します。`nginx -s stop` は正常終了なので復旧しません",
        "復旧を自動化したい場合は exit code とポリシーの組み合わせを設計します",
    ])
}

fn networking() -> Flow {
    Flow::new(
        "networking",
        "Container Networking",
        "外部公開ネットワークと内部ネットワークを分離し、到達範囲を確かめる",
        Difficulty::Advanced,
        "networking",
    )
    .steps(vec![
        FlowStep::action(
            "create_bridge_network",
            EngineAction::CreateNetwork {
                key: "bridge_net".to_string(),
                spec: NetworkSpec {
                    driver: "bridge".to_string(),
                    internal: false,
                    ..NetworkSpec::default()
                },
            },
        ),
        FlowStep::action(
            "create_internal_network",
            EngineAction::CreateNetwork {
                key: "internal_net".to_string(),
                spec: NetworkSpec {
                    driver: "bridge".to_string(),
                    internal: true,
                    ..NetworkSpec::default()
                },
            },
        ),
        FlowStep::action(
            "create_web",
            EngineAction::CreateContainer {
                key: "web".to_string(),
                spec: ContainerSpec {
                    image: "nginx:alpine".to_string(),
                    network: Some("bridge_net".to_string()),
                    ports: vec![PortMapping {
                        host: 8081,
                        container: 80,
                    }],
                    ..ContainerSpec::default()
                },
            },
        ),
        FlowStep::action(
            "start_web",
            EngineAction::StartContainer {
                key: "web".to_string(),
            },
        ),
        FlowStep::action(
            "create_backend",
            EngineAction::CreateContainer {
                key: "backend".to_string(),
                spec: ContainerSpec {
                    image: "alpine:latest".to_string(),
                    command: args(&["sleep", "300"]),
                    network: Some("internal_net".to_string()),
                    ..ContainerSpec::default()
                },
            },
        ),
        FlowStep::action(
            "start_backend",
            EngineAction::StartContainer {
                key: "backend".to_string(),
            },
        ),
        FlowStep::action(
            "connect_web_to_internal",
            EngineAction::ConnectNetwork {
                network: "internal_net".to_string(),
                container: "web".to_string(),
            },
        ),
        FlowStep::action(
            "ping_backend_from_web",
            EngineAction::Exec {
                key: "web".to_string(),
                command: args(&["ping", "-c", "1", "{{name:backend}}"]),
                expect: Some(MatchRule::Exact(" 0% packet loss".to_string())),
            },
        ),
        FlowStep::action(
            "probe_external_from_backend",
            EngineAction::Exec {
                key: "backend".to_string(),
                command: args(&["ping", "-c", "1", "-W", "2", "8.8.8.8"]),
                expect: None,
            },
        )
        .optional(),
        FlowStep::cleanup("teardown", Vec::new()),
    ])
    .notes(vec![
        "internal ネットワークのコンテナは外部へ到達できません。外部プローブの失敗は想定どおりです",
        "コンテナは複数のネットワークへ後から接続できます。web は両方に属しています",
        "到達できる・できないの境界こそがネットワーク分離の設計です",
    ])
}

fn volume_management() -> Flow {
    Flow::new(
        "volume_management",
        "Volume Management",
        "名前付きボリュームでコンテナ間・再実行間のデータ永続化を確かめる",
        Difficulty::Intermediate,
        "volumes",
    )
    .steps(vec![
        FlowStep::action(
            "create_volume",
            EngineAction::CreateVolume {
                key: "data".to_string(),
                spec: VolumeSpec::default(),
            },
        ),
        FlowStep::action(
            "create_writer",
            EngineAction::CreateContainer {
                key: "writer".to_string(),
                spec: ContainerSpec {
                    image: "alpine:latest".to_string(),
                    command: args(&[
                        "sh",
                        "-c",
                        "echo 'Persistent data example' > /data/test.txt && date >> /data/test.txt",
                    ]),
                    mounts: vec![MountSpec {
                        source: "data".to_string(),
                        target: "/data".to_string(),
                        read_only: false,
                    }],
                    ..ContainerSpec::default()
                },
            },
        ),
        FlowStep::action(
            "start_writer",
            EngineAction::StartContainer {
                key: "writer".to_string(),
            },
        ),
        wait_for_exit("wait_writer_done", "writer"),
        FlowStep::action(
            "create_reader",
            EngineAction::CreateContainer {
                key: "reader".to_string(),
                spec: ContainerSpec {
                    image: "alpine:latest".to_string(),
                    command: args(&["cat", "/data/test.txt"]),
                    mounts: vec![MountSpec {
                        source: "data".to_string(),
                        target: "/data".to_string(),
                        read_only: true,
                    }],
                    ..ContainerSpec::default()
                },
            },
        ),
        FlowStep::action(
            "start_reader",
            EngineAction::StartContainer {
                key: "reader".to_string(),
            },
        ),
        FlowStep::wait_for_patterns(
            "verify_persistence",
            "reader",
            vec![PatternSpec::exact(
                "Persistent data example",
                Duration::from_secs(10),
            )],
        ),
        FlowStep::cleanup("teardown", Vec::new()),
    ])
    .notes(vec![
        "コンテナのファイルシステムは使い捨てですが、ボリュームは削除するまで残ります",
        "読み取り専用マウント（:ro）で、読む側が誤って書き換える事故を防げます",
        "ボリュームの削除は、それを使う全コンテナを消した後でなければ失敗します",
    ])
}
