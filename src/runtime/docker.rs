//! Docker 互換 CLI クライアント
//!
//! # 責務
//!
//! - Docker 互換 CLI（`docker` / `podman`）との通信を担当
//! - [`ContainerEngine`] トレイトを実装し、統一インターフェースを提供
//! - CLI の標準エラー出力を [`EngineError`] のカテゴリへ分類
//!
//! # CLI ツール
//!
//! - **コマンド**: `docker`（設定で `podman` に切り替え可能）
//! - **到達性確認**: `docker version --format {{.Server.Version}}`
//!
//! # ログストリーム
//!
//! `docker logs --follow` を子プロセスとして起動し、標準出力・標準エラーを
//! 行単位でチャネルへ転送します。子プロセスは [`LogStream`] のドロップと
//! ともに回収されます（`kill_on_drop`）。
//!
//! # 使用例
//!
//! ```rust,no_run
//! use container_poker::runtime::docker::DockerCli;
//! use container_poker::runtime::ContainerEngine;
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = DockerCli::new();
//!
//!     // デーモンへの到達性を確認
//!     let version = engine.ping().await.unwrap();
//!     println!("server version: {}", version);
//! }
//! ```

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

use super::traits::{
    ContainerEngine, ContainerHandle, ContainerSpec, ContainerState, ExecOutput, HealthState,
    InspectReport, LogStream, NetworkHandle, NetworkSpec, VolumeHandle, VolumeSpec,
};
use crate::error::EngineError;

/// デフォルトの CLI コマンド名
const DEFAULT_COMMAND: &str = "docker";

/// ログストリームのチャネル容量
///
/// 消費側（パターンウォッチャー）が追い付かない間、読み取りタスクは
/// ここでバックプレッシャーを受けます。
const LOG_CHANNEL_CAPACITY: usize = 256;

/// Docker 互換 CLI クライアント
///
/// `docker` コマンドを呼び出してコンテナエンジンを操作します。
/// Podman など Docker CLI 互換のエンジンにもコマンド名の差し替えで
/// 対応できます。
pub struct DockerCli {
    /// 使用する CLI コマンド名（通常は "docker"）
    command: String,
}

impl DockerCli {
    /// 新しい Docker クライアントを生成
    ///
    /// # 例
    ///
    /// ```rust
    /// use container_poker::runtime::docker::DockerCli;
    ///
    /// let engine = DockerCli::new();
    /// ```
    pub fn new() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
        }
    }

    /// カスタムコマンド名を指定してクライアントを生成
    ///
    /// Podman 利用時やテストで使用します。
    ///
    /// # 引数
    ///
    /// - `command`: CLI コマンド名（例: "podman"）
    ///
    /// # 例
    ///
    /// ```rust
    /// use container_poker::runtime::docker::DockerCli;
    ///
    /// let engine = DockerCli::with_command("podman");
    /// ```
    pub fn with_command(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// CLI を 1 回実行し、標準出力を文字列で返す
    ///
    /// 非ゼロ終了時は標準エラー出力を分類して [`EngineError`] を返します。
    /// CLI 自体が見つからない場合は [`EngineError::CliNotFound`] です。
    async fn run(&self, args: &[String]) -> Result<String, EngineError> {
        debug!(command = %self.command, ?args, "エンジン CLI を実行します");

        let output = match Command::new(&self.command).args(args).output().await {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EngineError::CliNotFound(self.command.clone()));
            }
            Err(e) => return Err(EngineError::Io(e)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::from_stderr(&stderr, output.status.code()));
        }

        let stdout = String::from_utf8(output.stdout)?;
        Ok(stdout)
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerEngine for DockerCli {
    async fn ping(&self) -> Result<String, EngineError> {
        let args = vec![
            "version".to_string(),
            "--format".to_string(),
            "{{.Server.Version}}".to_string(),
        ];
        let stdout = self.run(&args).await?;
        Ok(stdout.trim().to_string())
    }

    async fn create_container(
        &self,
        spec: &ContainerSpec,
    ) -> Result<ContainerHandle, EngineError> {
        let args = create_args(spec);
        let stdout = self.run(&args).await?;
        Ok(ContainerHandle {
            id: stdout.trim().to_string(),
            name: spec.name.clone(),
        })
    }

    async fn start_container(&self, handle: &ContainerHandle) -> Result<(), EngineError> {
        self.run(&["start".to_string(), handle.id.clone()]).await?;
        Ok(())
    }

    async fn stop_container(&self, handle: &ContainerHandle) -> Result<(), EngineError> {
        self.run(&["stop".to_string(), handle.id.clone()]).await?;
        Ok(())
    }

    async fn remove_container(&self, handle: &ContainerHandle) -> Result<(), EngineError> {
        self.run(&["rm".to_string(), "-f".to_string(), handle.id.clone()])
            .await?;
        Ok(())
    }

    async fn inspect_container(
        &self,
        handle: &ContainerHandle,
    ) -> Result<InspectReport, EngineError> {
        let args = vec![
            "inspect".to_string(),
            "--format".to_string(),
            "{{json .State}}".to_string(),
            handle.id.clone(),
        ];
        let stdout = self.run(&args).await?;

        let state: InspectState = serde_json::from_str(stdout.trim()).map_err(|e| {
            EngineError::InvalidResponse(format!(
                "inspect 出力の JSON 解釈に失敗しました: {}. 出力: {}",
                e,
                stdout.trim()
            ))
        })?;

        Ok(InspectReport {
            state: ContainerState::parse(&state.status)?,
            exit_code: Some(state.exit_code),
            health: state
                .health
                .as_ref()
                .and_then(|h| HealthState::parse(&h.status)),
        })
    }

    async fn stream_logs(
        &self,
        handle: &ContainerHandle,
        tail: Option<u32>,
    ) -> Result<LogStream, EngineError> {
        let mut command = Command::new(&self.command);
        command.arg("logs").arg("--follow");
        if let Some(n) = tail {
            command.arg("--tail").arg(n.to_string());
        }
        command
            .arg(&handle.id)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(container = %handle.name, "ログ追跡プロセスを起動します");

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EngineError::CliNotFound(self.command.clone()));
            }
            Err(e) => return Err(EngineError::Io(e)),
        };

        let (tx, rx) = mpsc::channel(LOG_CHANNEL_CAPACITY);

        // コンテナは stdout / stderr のどちらにもログを書くため両方を転送する
        if let Some(stdout) = child.stdout.take() {
            spawn_line_forwarder(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_forwarder(stderr, tx.clone());
        }
        drop(tx);

        Ok(LogStream::with_child(rx, child))
    }

    async fn exec(
        &self,
        handle: &ContainerHandle,
        command: &[String],
    ) -> Result<ExecOutput, EngineError> {
        let mut args = vec!["exec".to_string(), handle.id.clone()];
        args.extend(command.iter().cloned());

        debug!(container = %handle.name, ?command, "コンテナ内コマンドを実行します");

        let output = match Command::new(&self.command).args(&args).output().await {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EngineError::CliNotFound(self.command.clone()));
            }
            Err(e) => return Err(EngineError::Io(e)),
        };

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        // エンジン側の失敗とコンテナ内コマンドの非ゼロ終了を区別する。
        // コンテナ不在やデーモン未到達はエラー、それ以外は ExecOutput。
        if !output.status.success() && is_engine_side_failure(&stderr) {
            return Err(EngineError::from_stderr(&stderr, output.status.code()));
        }

        let stdout = String::from_utf8(output.stdout)?;
        Ok(ExecOutput {
            exit_code: i64::from(output.status.code().unwrap_or(-1)),
            stdout,
            stderr,
        })
    }

    async fn create_network(&self, spec: &NetworkSpec) -> Result<NetworkHandle, EngineError> {
        let mut args = vec!["network".to_string(), "create".to_string()];
        args.push("--driver".to_string());
        args.push(if spec.driver.is_empty() {
            "bridge".to_string()
        } else {
            spec.driver.clone()
        });
        if spec.internal {
            args.push("--internal".to_string());
        }
        for (key, value) in &spec.labels {
            args.push("--label".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(spec.name.clone());

        let stdout = self.run(&args).await?;
        Ok(NetworkHandle {
            id: stdout.trim().to_string(),
            name: spec.name.clone(),
        })
    }

    async fn connect_network(
        &self,
        network: &NetworkHandle,
        container: &ContainerHandle,
    ) -> Result<(), EngineError> {
        self.run(&[
            "network".to_string(),
            "connect".to_string(),
            network.name.clone(),
            container.id.clone(),
        ])
        .await?;
        Ok(())
    }

    async fn remove_network(&self, handle: &NetworkHandle) -> Result<(), EngineError> {
        self.run(&["network".to_string(), "rm".to_string(), handle.id.clone()])
            .await?;
        Ok(())
    }

    async fn create_volume(&self, spec: &VolumeSpec) -> Result<VolumeHandle, EngineError> {
        let mut args = vec!["volume".to_string(), "create".to_string()];
        for (key, value) in &spec.labels {
            args.push("--label".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(spec.name.clone());

        let stdout = self.run(&args).await?;
        Ok(VolumeHandle {
            name: stdout.trim().to_string(),
        })
    }

    async fn remove_volume(&self, handle: &VolumeHandle) -> Result<(), EngineError> {
        self.run(&[
            "volume".to_string(),
            "rm".to_string(),
            handle.name.clone(),
        ])
        .await?;
        Ok(())
    }
}

/// `create` サブコマンドの引数列を構築
///
/// フラグ → イメージ → コマンドの順序は CLI の要求どおりです。
fn create_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec!["create".to_string()];

    args.push("--name".to_string());
    args.push(spec.name.clone());

    for (key, value) in &spec.labels {
        args.push("--label".to_string());
        args.push(format!("{}={}", key, value));
    }

    for (key, value) in &spec.env {
        args.push("-e".to_string());
        args.push(format!("{}={}", key, value));
    }

    if let Some(network) = &spec.network {
        args.push("--network".to_string());
        args.push(network.clone());
    }

    for port in &spec.ports {
        args.push("-p".to_string());
        args.push(format!("{}:{}", port.host, port.container));
    }

    for mount in &spec.mounts {
        args.push("-v".to_string());
        if mount.read_only {
            args.push(format!("{}:{}:ro", mount.source, mount.target));
        } else {
            args.push(format!("{}:{}", mount.source, mount.target));
        }
    }

    if let Some(health) = &spec.healthcheck {
        args.push("--health-cmd".to_string());
        args.push(health.test.join(" "));
        args.push("--health-interval".to_string());
        args.push(duration_arg(health.interval));
        args.push("--health-timeout".to_string());
        args.push(duration_arg(health.timeout));
        args.push("--health-retries".to_string());
        args.push(health.retries.to_string());
        args.push("--health-start-period".to_string());
        args.push(duration_arg(health.start_period));
    }

    if let Some(policy) = &spec.restart_policy {
        args.push("--restart".to_string());
        args.push(policy.clone());
    }

    if spec.tty {
        args.push("-t".to_string());
    }
    if spec.open_stdin {
        args.push("-i".to_string());
    }

    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());

    args
}

/// CLI の時間引数表現（秒単位）
fn duration_arg(duration: Duration) -> String {
    format!("{}s", duration.as_secs())
}

/// exec の失敗がエンジン側の問題かどうか
///
/// コンテナ内コマンドの非ゼロ終了と区別するため、エンジン由来と
/// 断定できるフレーズのみを対象にします。
fn is_engine_side_failure(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("no such container")
        || lower.contains("is not running")
        || lower.contains("cannot connect to the docker daemon")
        || lower.contains("is the docker daemon running")
        || lower.contains("permission denied while trying to connect")
}

/// 子プロセスの出力を行単位でチャネルへ転送するタスクを起動
fn spawn_line_forwarder<R>(reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            // 受信側が閉じたら転送を打ち切る
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });
}

/// `inspect --format '{{json .State}}'` の出力形式
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    /// 状態文字列（"running", "exited" など）
    status: String,

    /// 終了コード
    exit_code: i64,

    /// ヘルスチェック情報（未設定なら欠落）
    #[serde(default)]
    health: Option<InspectHealth>,
}

/// inspect 出力のヘルスチェック部分
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHealth {
    /// ヘルス状態文字列（"starting", "healthy", "unhealthy"）
    status: String,
}
