//! コンテナエンジンの共通インターフェース定義
//!
//! # 責務
//!
//! - コンテナエンジン（Docker, Podman 等）の共通トレイト [`ContainerEngine`] を定義
//! - エンジン非依存のリソースハンドル（[`ContainerHandle`] ほか）を提供
//! - コンテナ作成仕様 [`ContainerSpec`]、検査結果 [`InspectReport`]、
//!   exec 結果 [`ExecOutput`]、ログストリーム [`LogStream`] の型を定義
//!
//! # 実装方式
//!
//! このモジュールは **CLI ツール呼び出しベース** で設計されています。
//! - Docker: `docker` コマンド
//! - Podman: `podman` コマンド（Docker CLI 互換）
//!
//! デーモンへの認証・接続管理は CLI に委譲し、コード内では扱いません。
//!
//! # 使用例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use container_poker::runtime::{ContainerEngine, ContainerSpec};
//!
//! async fn example(engine: Arc<dyn ContainerEngine>) {
//!     let spec = ContainerSpec {
//!         image: "ubuntu:latest".to_string(),
//!         name: "demo".to_string(),
//!         command: vec!["echo".to_string(), "hello".to_string()],
//!         ..ContainerSpec::default()
//!     };
//!
//!     let handle = engine.create_container(&spec).await.unwrap();
//!     engine.start_container(&handle).await.unwrap();
//!     engine.remove_container(&handle).await.unwrap();
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Child;
use tokio::sync::mpsc;

use crate::error::EngineError;

/// コンテナエンジンの共通インターフェース
///
/// このトレイトを実装することで、任意の Docker 互換エンジンを
/// オーケストレーションエンジンに接続できます。
///
/// # 実装要件
///
/// - `Send + Sync`: 複数のフローが並行に同一クライアントを共有します
/// - 非同期実行対応（`async_trait` を使用）
/// - 各操作は独立しており、実装側で呼び出し間の同期を取る必要はありません
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// エンジンデーモンへの到達性を確認する
    ///
    /// # 戻り値
    ///
    /// - `Ok(String)`: サーバーのバージョン文字列
    /// - `Err(EngineError)`: CLI 不在またはデーモン未到達
    async fn ping(&self) -> Result<String, EngineError>;

    /// コンテナを作成する（開始はしない）
    ///
    /// # 引数
    ///
    /// - `spec`: イメージ・コマンド・環境変数などの作成仕様
    ///
    /// # 戻り値
    ///
    /// - `Ok(ContainerHandle)`: 作成されたコンテナの ID と名前
    ///
    /// # エラー
    ///
    /// - [`EngineError::ImageNotFound`] - イメージが取得できない
    /// - [`EngineError::AlreadyExists`] - 同名コンテナが存在する
    /// - [`EngineError::PortAllocated`] - 公開ポートが使用中
    async fn create_container(&self, spec: &ContainerSpec)
        -> Result<ContainerHandle, EngineError>;

    /// 作成済みコンテナを開始する
    async fn start_container(&self, handle: &ContainerHandle) -> Result<(), EngineError>;

    /// 実行中のコンテナを停止する
    async fn stop_container(&self, handle: &ContainerHandle) -> Result<(), EngineError>;

    /// コンテナを削除する（実行中なら強制削除）
    async fn remove_container(&self, handle: &ContainerHandle) -> Result<(), EngineError>;

    /// コンテナの現在状態を取得する
    ///
    /// # 戻り値
    ///
    /// - `Ok(InspectReport)`: 状態・終了コード・ヘルス状態
    async fn inspect_container(&self, handle: &ContainerHandle)
        -> Result<InspectReport, EngineError>;

    /// コンテナのログを行単位のライブストリームとして取得する
    ///
    /// ストリームはコンテナが終了しログを出し切った時点で終端します。
    /// 実行中のコンテナに対しては新しい行が出力されるまでブロックします。
    ///
    /// # 引数
    ///
    /// - `handle`: 対象コンテナ
    /// - `tail`: 直近 N 行から追跡を始める場合に指定
    async fn stream_logs(
        &self,
        handle: &ContainerHandle,
        tail: Option<u32>,
    ) -> Result<LogStream, EngineError>;

    /// 実行中のコンテナ内でコマンドを実行する
    ///
    /// コンテナ内コマンドの非ゼロ終了は [`ExecOutput::exit_code`] で表現され、
    /// `Err` にはなりません。`Err` はエンジン側の失敗
    /// （コンテナ不在、デーモン未到達など）に限られます。
    ///
    /// # 引数
    ///
    /// - `handle`: 対象コンテナ
    /// - `command`: 実行するコマンドと引数
    async fn exec(
        &self,
        handle: &ContainerHandle,
        command: &[String],
    ) -> Result<ExecOutput, EngineError>;

    /// ネットワークを作成する
    async fn create_network(&self, spec: &NetworkSpec) -> Result<NetworkHandle, EngineError>;

    /// 実行中・作成済みコンテナをネットワークに接続する
    async fn connect_network(
        &self,
        network: &NetworkHandle,
        container: &ContainerHandle,
    ) -> Result<(), EngineError>;

    /// ネットワークを削除する
    async fn remove_network(&self, handle: &NetworkHandle) -> Result<(), EngineError>;

    /// 名前付きボリュームを作成する
    async fn create_volume(&self, spec: &VolumeSpec) -> Result<VolumeHandle, EngineError>;

    /// ボリュームを削除する
    async fn remove_volume(&self, handle: &VolumeHandle) -> Result<(), EngineError>;
}

/// 作成されたコンテナへの参照
///
/// エンジンが払い出した ID と、作成時に指定した名前を保持します。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    /// エンジンが払い出したコンテナ ID
    pub id: String,

    /// コンテナ名
    pub name: String,
}

/// 作成されたネットワークへの参照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkHandle {
    /// ネットワーク ID
    pub id: String,

    /// ネットワーク名
    pub name: String,
}

/// 作成されたボリュームへの参照
///
/// Docker 互換エンジンのボリュームは名前がそのまま識別子になります。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeHandle {
    /// ボリューム名
    pub name: String,
}

/// コンテナの作成仕様
///
/// フロー定義のステップに記述され、実行時に名前とラベルが
/// 実行コンテキストによって確定されます。
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    /// イメージ参照（例: "ubuntu:latest"）
    pub image: String,

    /// コンテナ名（実行時に一意な名前へ置き換えられる）
    pub name: String,

    /// 実行コマンド（空ならイメージのデフォルト）
    pub command: Vec<String>,

    /// 環境変数（宣言順を保持）
    pub env: Vec<(String, String)>,

    /// 接続するネットワーク名
    pub network: Option<String>,

    /// ポート公開設定
    pub ports: Vec<PortMapping>,

    /// ボリュームマウント設定
    pub mounts: Vec<MountSpec>,

    /// 付与するラベル（宣言順を保持）
    pub labels: Vec<(String, String)>,

    /// ヘルスチェック設定
    pub healthcheck: Option<HealthcheckSpec>,

    /// 再起動ポリシー（例: "on-failure:3"）
    pub restart_policy: Option<String>,

    /// 擬似 TTY を割り当てる
    pub tty: bool,

    /// 標準入力を開いたままにする
    pub open_stdin: bool,
}

/// ポート公開設定
///
/// TCP のみを対象とします（教材フローで UDP は使用しません）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    /// ホスト側ポート
    pub host: u16,

    /// コンテナ側ポート
    pub container: u16,
}

/// ボリュームマウント設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    /// マウント元（ボリューム名）
    pub source: String,

    /// コンテナ内のマウント先パス
    pub target: String,

    /// 読み取り専用でマウントする
    pub read_only: bool,
}

/// コンテナのヘルスチェック設定
#[derive(Debug, Clone)]
pub struct HealthcheckSpec {
    /// チェックコマンド（例: `["curl", "-f", "http://localhost/"]`）
    pub test: Vec<String>,

    /// チェック間隔
    pub interval: Duration,

    /// 1 回のチェックのタイムアウト
    pub timeout: Duration,

    /// 失敗と判定するまでの連続失敗回数
    pub retries: u32,

    /// 起動直後の猶予期間
    pub start_period: Duration,
}

/// ネットワークの作成仕様
#[derive(Debug, Clone, Default)]
pub struct NetworkSpec {
    /// ネットワーク名（実行時に一意な名前へ置き換えられる）
    pub name: String,

    /// ドライバー（空なら "bridge"）
    pub driver: String,

    /// 外部への通信を遮断する内部ネットワークにする
    pub internal: bool,

    /// 付与するラベル
    pub labels: Vec<(String, String)>,
}

/// ボリュームの作成仕様
#[derive(Debug, Clone, Default)]
pub struct VolumeSpec {
    /// ボリューム名（実行時に一意な名前へ置き換えられる）
    pub name: String,

    /// 付与するラベル
    pub labels: Vec<(String, String)>,
}

/// コンテナの状態
///
/// `inspect` が返す `State.Status` の値に対応します。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    /// 作成済み・未開始
    Created,

    /// 実行中
    Running,

    /// 一時停止中
    Paused,

    /// 再起動中
    Restarting,

    /// 削除中
    Removing,

    /// 終了済み
    Exited,

    /// デーモンが停止に失敗した異常状態
    Dead,
}

impl ContainerState {
    /// エンジンの状態文字列から変換
    ///
    /// 未知の文字列は [`EngineError::InvalidResponse`] になります。
    pub fn parse(value: &str) -> Result<Self, EngineError> {
        match value {
            "created" => Ok(ContainerState::Created),
            "running" => Ok(ContainerState::Running),
            "paused" => Ok(ContainerState::Paused),
            "restarting" => Ok(ContainerState::Restarting),
            "removing" => Ok(ContainerState::Removing),
            "exited" => Ok(ContainerState::Exited),
            "dead" => Ok(ContainerState::Dead),
            other => Err(EngineError::InvalidResponse(format!(
                "未知のコンテナ状態: {}",
                other
            ))),
        }
    }

    /// 状態の学習者向け説明
    pub fn explanation(&self) -> &'static str {
        match self {
            ContainerState::Created => "コンテナは作成されましたが、まだ開始されていません",
            ContainerState::Running => "コンテナは実行中です",
            ContainerState::Paused => "コンテナは一時停止中です。`unpause` で再開できます",
            ContainerState::Restarting => "コンテナは再起動ポリシーに従って再起動中です",
            ContainerState::Removing => "コンテナは削除処理中です",
            ContainerState::Exited => "コンテナは終了しました。終了コードで成否を確認できます",
            ContainerState::Dead => "コンテナは異常状態です。デーモンのログを確認してください",
        }
    }
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Restarting => "restarting",
            ContainerState::Removing => "removing",
            ContainerState::Exited => "exited",
            ContainerState::Dead => "dead",
        };
        write!(f, "{}", label)
    }
}

/// ヘルスチェックの判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// 猶予期間中で判定前
    Starting,

    /// 健全
    Healthy,

    /// 連続失敗が閾値を超えた
    Unhealthy,
}

impl HealthState {
    /// エンジンのヘルス状態文字列から変換
    ///
    /// ヘルスチェック未設定のコンテナでは `None` を返します。
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "starting" => Some(HealthState::Starting),
            "healthy" => Some(HealthState::Healthy),
            "unhealthy" => Some(HealthState::Unhealthy),
            _ => None,
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            HealthState::Starting => "starting",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
        };
        write!(f, "{}", label)
    }
}

/// `inspect` の結果
#[derive(Debug, Clone)]
pub struct InspectReport {
    /// コンテナの状態
    pub state: ContainerState,

    /// 終了コード（終了済みの場合のみ意味を持つ）
    pub exit_code: Option<i64>,

    /// ヘルスチェックの判定（未設定なら `None`）
    pub health: Option<HealthState>,
}

/// コンテナ内コマンドの実行結果
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// コンテナ内コマンドの終了コード
    pub exit_code: i64,

    /// 標準出力
    pub stdout: String,

    /// 標準エラー出力
    pub stderr: String,
}

impl ExecOutput {
    /// コマンドが成功（終了コード 0）したか
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// 終了コードの学習者向け説明
    ///
    /// # 例
    ///
    /// ```
    /// use container_poker::runtime::ExecOutput;
    ///
    /// let output = ExecOutput {
    ///     exit_code: 127,
    ///     stdout: String::new(),
    ///     stderr: "sh: curl: not found".to_string(),
    /// };
    /// assert!(output.explain_exit_code().contains("見つかりません"));
    /// ```
    pub fn explain_exit_code(&self) -> &'static str {
        explain_exit_code(self.exit_code)
    }
}

/// 終了コードの学習者向け説明
///
/// よく遭遇するコードに絞った説明を返します。
pub fn explain_exit_code(code: i64) -> &'static str {
    match code {
        0 => "成功しました",
        1 => "一般的なエラーで終了しました。コマンドの出力を確認してください",
        126 => "コマンドを実行できません。実行権限を確認してください",
        127 => "コマンドが見つかりません。コンテナ内にインストールされているか確認してください",
        130 => "割り込み（Ctrl+C 相当）で終了しました",
        _ => "コマンド固有の終了コードです。そのコマンドのドキュメントを確認してください",
    }
}

/// 行単位のライブログストリーム
///
/// エンジンのログ追跡プロセスから 1 行ずつ受信します。チャネルが
/// 閉じられた時点（コンテナ終了とログ排出の完了）でストリーム終端と
/// なります。内部プロセスはこの値のドロップとともに終了します。
pub struct LogStream {
    rx: mpsc::Receiver<String>,
    // ドロップ時に追跡プロセスを確実に回収する（kill_on_drop 設定済み）
    _child: Option<Child>,
}

impl LogStream {
    /// 行チャネルの受信側からストリームを構築
    pub fn new(rx: mpsc::Receiver<String>) -> Self {
        Self { rx, _child: None }
    }

    /// ログ追跡プロセスの所有権ごとストリームを構築
    ///
    /// `child` は `kill_on_drop(true)` で起動されていることが前提です。
    pub fn with_child(rx: mpsc::Receiver<String>, child: Child) -> Self {
        Self {
            rx,
            _child: Some(child),
        }
    }

    /// 固定の行リストからストリームを構築
    ///
    /// 全行を送信済みの閉じたチャネルを返します。モック実装で使用します。
    pub fn from_lines(lines: Vec<String>) -> Self {
        let (tx, rx) = mpsc::channel(lines.len().max(1));
        for line in lines {
            // 容量を行数で確保しているため送信は失敗しない
            let _ = tx.try_send(line);
        }
        drop(tx);
        Self { rx, _child: None }
    }

    /// 次の行を受信する
    ///
    /// # 戻り値
    ///
    /// - `Some(String)`: 次のログ行
    /// - `None`: ストリーム終端（これ以上行は来ない）
    pub async fn next_line(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

impl std::fmt::Debug for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStream")
            .field("attached", &self._child.is_some())
            .finish()
    }
}
