//! 実行コンテキストの管理
//!
//! # 責務
//!
//! - フロー実行 1 回分で作成したリソース（コンテナ/ネットワーク/ボリューム）の追跡
//! - 論理キーから実際のエンジン上リソース名への変換（実行 ID による一意化）
//! - 実行終了時の逆順・ベストエフォートなリソース解放
//!
//! # 主要な型
//!
//! - [`ExecutionContext`][]: フロー実行 1 回分のコンテキスト
//! - [`ResourceHandle`][]: 追跡対象リソースのハンドル
//!
//! # 使用例
//!
//! ```rust
//! use container_poker::config::Settings;
//! use container_poker::engine::context::{ExecutionContext, ResourceHandle};
//! use container_poker::runtime::ContainerHandle;
//!
//! let settings = Settings::default();
//! let mut ctx = ExecutionContext::new("hello_world", &settings);
//!
//! // 論理キーから実際のリソース名を導出（実行ごとに一意）
//! let name = ctx.resource_name("demo");
//! assert!(name.starts_with("cpoker-demo-"));
//!
//! // 作成したリソースを追跡
//! ctx.track(
//!     "demo",
//!     ResourceHandle::Container(ContainerHandle {
//!         id: "abc123".to_string(),
//!         name: name.clone(),
//!     }),
//! );
//!
//! // 後続ステップから実名を参照
//! assert_eq!(ctx.name_of("demo"), Some(name.as_str()));
//! ```

use crate::config::Settings;
use crate::runtime::{ContainerEngine, ContainerHandle, NetworkHandle, VolumeHandle};
use std::time::SystemTime;
use tracing::{debug, warn};
use uuid::Uuid;

/// 追跡対象リソースのハンドル
///
/// エンジン上に実在するリソースを種別ごとに包みます。
#[derive(Debug, Clone)]
pub enum ResourceHandle {
    /// コンテナ
    Container(ContainerHandle),
    /// ネットワーク
    Network(NetworkHandle),
    /// ボリューム
    Volume(VolumeHandle),
}

impl ResourceHandle {
    /// エンジン上のリソース名
    pub fn name(&self) -> &str {
        match self {
            Self::Container(handle) => &handle.name,
            Self::Network(handle) => &handle.name,
            Self::Volume(handle) => &handle.name,
        }
    }

    /// ログ用の種別表記
    fn kind_label(&self) -> &'static str {
        match self {
            Self::Container(_) => "コンテナ",
            Self::Network(_) => "ネットワーク",
            Self::Volume(_) => "ボリューム",
        }
    }
}

/// 追跡エントリ（論理キーとハンドルの対）
#[derive(Debug, Clone)]
struct TrackedResource {
    key: String,
    handle: ResourceHandle,
}

/// 実行コンテキスト
///
/// フロー実行 1 回分が作成したリソースを作成順に記録し、
/// 終了時に逆順で解放するための台帳です。コンテキストは実行ごとに
/// 独立しており、並行する実行同士が状態を共有することはありません。
///
/// # リソース名の一意化
///
/// リソース名は `{接頭辞}-{論理キー}-{実行ID}` の形式で導出されます。
/// 実行 ID は実行ごとに新しく採番されるため、同じフローを同時に
/// 複数回実行しても名前が衝突しません。
#[derive(Debug)]
pub struct ExecutionContext {
    flow_name: String,
    run_id: String,
    name_prefix: String,
    owner_label: String,
    start_time: SystemTime,

    // 作成順のリソース台帳（解放はこの逆順）
    resources: Vec<TrackedResource>,
}

impl ExecutionContext {
    /// 新しい実行コンテキストを生成
    ///
    /// # 引数
    ///
    /// - `flow_name`: 実行するフローの名前
    /// - `settings`: リソース命名に使う設定（接頭辞と所有ラベル）
    ///
    /// # 例
    ///
    /// ```rust
    /// use container_poker::config::Settings;
    /// use container_poker::engine::context::ExecutionContext;
    ///
    /// let ctx = ExecutionContext::new("hello_world", &Settings::default());
    /// assert_eq!(ctx.run_id().len(), 8);
    /// ```
    pub fn new(flow_name: impl Into<String>, settings: &Settings) -> Self {
        let run_id = Uuid::new_v4().simple().to_string()[..8].to_string();
        Self {
            flow_name: flow_name.into(),
            run_id,
            name_prefix: settings.name_prefix.clone(),
            owner_label: settings.owner_label.clone(),
            start_time: SystemTime::now(),
            resources: Vec::new(),
        }
    }

    /// 実行中のフロー名
    pub fn flow_name(&self) -> &str {
        &self.flow_name
    }

    /// この実行の ID（8 桁の16進文字列）
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// 実行開始時刻
    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    /// 論理キーからエンジン上のリソース名を導出
    ///
    /// キーは小文字化され、英数字以外の文字はハイフンに置き換えられます。
    /// アンダースコアもハイフンになるため、導出された名前はそのまま
    /// コンテナ間の DNS 名として使えます。
    ///
    /// # 例
    ///
    /// ```rust
    /// use container_poker::config::Settings;
    /// use container_poker::engine::context::ExecutionContext;
    ///
    /// let ctx = ExecutionContext::new("demo", &Settings::default());
    /// let name = ctx.resource_name("data_store");
    /// assert!(name.starts_with("cpoker-data-store-"));
    /// ```
    pub fn resource_name(&self, key: &str) -> String {
        format!(
            "{}-{}-{}",
            self.name_prefix,
            sanitize_key(key),
            self.run_id
        )
    }

    /// この実行が作るリソースへ付与するラベル
    ///
    /// `created-by` ラベルで所有者を示し、手動での一括掃除
    /// （`docker ps --filter label=created-by=...` など）を可能にします。
    pub fn labels(&self) -> Vec<(String, String)> {
        vec![
            ("created-by".to_string(), self.owner_label.clone()),
            ("educational".to_string(), "true".to_string()),
        ]
    }

    /// 作成したリソースを台帳へ記録
    pub fn track(&mut self, key: impl Into<String>, handle: ResourceHandle) {
        let key = key.into();
        debug!(key = %key, name = %handle.name(), "リソースを追跡します");
        self.resources.push(TrackedResource { key, handle });
    }

    /// 論理キーに対応するコンテナハンドル
    pub fn container(&self, key: &str) -> Option<&ContainerHandle> {
        self.resources.iter().find_map(|r| match &r.handle {
            ResourceHandle::Container(handle) if r.key == key => Some(handle),
            _ => None,
        })
    }

    /// 論理キーに対応するネットワークハンドル
    pub fn network(&self, key: &str) -> Option<&NetworkHandle> {
        self.resources.iter().find_map(|r| match &r.handle {
            ResourceHandle::Network(handle) if r.key == key => Some(handle),
            _ => None,
        })
    }

    /// 論理キーに対応するボリュームハンドル
    pub fn volume(&self, key: &str) -> Option<&VolumeHandle> {
        self.resources.iter().find_map(|r| match &r.handle {
            ResourceHandle::Volume(handle) if r.key == key => Some(handle),
            _ => None,
        })
    }

    /// 論理キーに対応するエンジン上のリソース名（種別を問わない）
    ///
    /// exec コマンドや環境変数の中の `{{name:キー}}` を実名へ展開する
    /// ときに使われます。
    pub fn name_of(&self, key: &str) -> Option<&str> {
        self.resources
            .iter()
            .find(|r| r.key == key)
            .map(|r| r.handle.name())
    }

    /// 追跡中の論理キー一覧（作成順）
    pub fn tracked_keys(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.key.as_str()).collect()
    }

    /// 台帳からリソースを外す（エンジン操作は行わない）
    ///
    /// フローが明示的な削除アクションでリソースを消した場合に、
    /// 最終クリーンアップの対象から除くために使います。
    pub fn untrack(&mut self, key: &str) -> Option<ResourceHandle> {
        let index = self.resources.iter().position(|r| r.key == key)?;
        Some(self.resources.remove(index).handle)
    }

    /// 追跡中のリソース数
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// 追跡中のリソースが無いかどうか
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// 指定キーのリソースを解放
    ///
    /// `keys` が空の場合は追跡中の全リソースを対象にします。
    /// 対象は作成の逆順で解放され、解放が済んだものから順に台帳を外れます。
    /// タイムアウトやキャンセルで途中中断されても、未解放のリソースは
    /// 追跡されたまま残り、次の解放呼び出しの対象になります。
    /// 解放の失敗はログと戻り値の警告に残るだけで、エラーにはなりません。
    /// 一度台帳から外れたリソースは二度目の呼び出しでは対象になりません。
    ///
    /// # 戻り値
    ///
    /// 解放に失敗したリソースについての警告メッセージ
    pub async fn release(&mut self, engine: &dyn ContainerEngine, keys: &[String]) -> Vec<String> {
        let mut warnings = Vec::new();
        loop {
            // 解放が完了するまでは台帳から外さない。途中で Future が
            // drop されても残りは追跡されたまま次の呼び出しへ持ち越される
            let Some(index) = self
                .resources
                .iter()
                .rposition(|r| keys.is_empty() || keys.iter().any(|k| k == &r.key))
            else {
                break;
            };
            if let Some(warning) = release_one(engine, &self.resources[index]).await {
                warnings.push(warning);
            }
            self.resources.remove(index);
        }
        warnings
    }

    /// 追跡中の全リソースを作成の逆順で解放
    ///
    /// # 戻り値
    ///
    /// 解放に失敗したリソースについての警告メッセージ
    pub async fn release_all(&mut self, engine: &dyn ContainerEngine) -> Vec<String> {
        self.release(engine, &[]).await
    }
}

/// リソース 1 件のベストエフォート解放
///
/// 既に存在しないリソースは解放済みとみなします。
async fn release_one(engine: &dyn ContainerEngine, resource: &TrackedResource) -> Option<String> {
    let name = resource.handle.name().to_string();
    debug!(
        kind = resource.handle.kind_label(),
        name = %name,
        "リソースを解放します"
    );

    let result = match &resource.handle {
        ResourceHandle::Container(handle) => {
            // 停止の失敗（既に終了している等）は削除の妨げにならない
            if let Err(e) = engine.stop_container(handle).await {
                debug!(name = %name, error = %e, "コンテナ停止をスキップしました");
            }
            engine.remove_container(handle).await
        }
        ResourceHandle::Network(handle) => engine.remove_network(handle).await,
        ResourceHandle::Volume(handle) => engine.remove_volume(handle).await,
    };

    match result {
        Ok(()) => None,
        Err(e) if e.is_not_found() => {
            debug!(name = %name, "リソースは既に存在しませんでした");
            None
        }
        Err(e) => {
            let warning = format!(
                "{} \"{}\" の解放に失敗しました: {}",
                resource.handle.kind_label(),
                name,
                e
            );
            warn!("{}", warning);
            Some(warning)
        }
    }
}

/// 論理キーを名前に使える形へ正規化
///
/// 英数字は小文字のまま残し、それ以外はハイフンへ置き換えます。
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::runtime::{
        ContainerSpec, ExecOutput, InspectReport, LogStream, NetworkSpec, VolumeSpec,
    };
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// 解放系の呼び出しだけを記録する最小限のエンジン実装
    #[derive(Default)]
    struct RecordingEngine {
        ops: Arc<Mutex<Vec<String>>>,
        fail_container_removal: bool,
        // true の間は最初の stop だけ完了しない（2 回目からは成功する）
        hang_first_stop: Mutex<bool>,
    }

    impl RecordingEngine {
        fn new() -> Self {
            Self::default()
        }

        fn failing() -> Self {
            Self {
                fail_container_removal: true,
                ..Self::default()
            }
        }

        fn stalling() -> Self {
            Self {
                hang_first_stop: Mutex::new(true),
                ..Self::default()
            }
        }

        fn record(&self, op: String) {
            self.ops.lock().unwrap().push(op);
        }

        fn recorded(&self) -> Vec<String> {
            self.ops.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContainerEngine for RecordingEngine {
        async fn ping(&self) -> Result<String, EngineError> {
            Ok("test".to_string())
        }

        async fn create_container(
            &self,
            spec: &ContainerSpec,
        ) -> Result<ContainerHandle, EngineError> {
            Ok(ContainerHandle {
                id: "unused".to_string(),
                name: spec.name.clone(),
            })
        }

        async fn start_container(&self, _handle: &ContainerHandle) -> Result<(), EngineError> {
            Ok(())
        }

        async fn stop_container(&self, handle: &ContainerHandle) -> Result<(), EngineError> {
            self.record(format!("stop:{}", handle.name));
            if std::mem::take(&mut *self.hang_first_stop.lock().unwrap()) {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        async fn remove_container(&self, handle: &ContainerHandle) -> Result<(), EngineError> {
            self.record(format!("remove_container:{}", handle.name));
            if self.fail_container_removal {
                return Err(EngineError::CommandFailed {
                    code: Some(1),
                    stderr: "removal refused".to_string(),
                });
            }
            Ok(())
        }

        async fn inspect_container(
            &self,
            _handle: &ContainerHandle,
        ) -> Result<InspectReport, EngineError> {
            Err(EngineError::InvalidResponse("テストでは未使用".to_string()))
        }

        async fn stream_logs(
            &self,
            _handle: &ContainerHandle,
            _tail: Option<u32>,
        ) -> Result<LogStream, EngineError> {
            Ok(LogStream::from_lines(Vec::new()))
        }

        async fn exec(
            &self,
            _handle: &ContainerHandle,
            _command: &[String],
        ) -> Result<ExecOutput, EngineError> {
            Err(EngineError::InvalidResponse("テストでは未使用".to_string()))
        }

        async fn create_network(&self, spec: &NetworkSpec) -> Result<NetworkHandle, EngineError> {
            Ok(NetworkHandle {
                id: "unused".to_string(),
                name: spec.name.clone(),
            })
        }

        async fn connect_network(
            &self,
            _network: &NetworkHandle,
            _container: &ContainerHandle,
        ) -> Result<(), EngineError> {
            Ok(())
        }

        async fn remove_network(&self, handle: &NetworkHandle) -> Result<(), EngineError> {
            self.record(format!("remove_network:{}", handle.name));
            Ok(())
        }

        async fn create_volume(&self, spec: &VolumeSpec) -> Result<VolumeHandle, EngineError> {
            Ok(VolumeHandle {
                name: spec.name.clone(),
            })
        }

        async fn remove_volume(&self, handle: &VolumeHandle) -> Result<(), EngineError> {
            self.record(format!("remove_volume:{}", handle.name));
            Ok(())
        }
    }

    fn context() -> ExecutionContext {
        ExecutionContext::new("test_flow", &Settings::default())
    }

    fn container(name: &str) -> ResourceHandle {
        ResourceHandle::Container(ContainerHandle {
            id: format!("id-{name}"),
            name: name.to_string(),
        })
    }

    fn network(name: &str) -> ResourceHandle {
        ResourceHandle::Network(NetworkHandle {
            id: format!("id-{name}"),
            name: name.to_string(),
        })
    }

    fn volume(name: &str) -> ResourceHandle {
        ResourceHandle::Volume(VolumeHandle {
            name: name.to_string(),
        })
    }

    /// 新規コンテキストの初期状態
    #[test]
    fn test_new_context() {
        let ctx = context();

        assert_eq!(ctx.flow_name(), "test_flow");
        assert_eq!(ctx.run_id().len(), 8);
        assert!(ctx.run_id().chars().all(|c| c.is_ascii_hexdigit()));
        assert!(ctx.is_empty());
        assert_eq!(ctx.len(), 0);
    }

    /// 実行 ID はコンテキストごとに異なる
    #[test]
    fn test_run_ids_are_unique() {
        let first = context();
        let second = context();
        assert_ne!(first.run_id(), second.run_id());
    }

    /// リソース名の導出と正規化
    #[test]
    fn test_resource_name_derivation() {
        let ctx = context();

        let name = ctx.resource_name("db");
        assert_eq!(name, format!("cpoker-db-{}", ctx.run_id()));

        // アンダースコアは DNS で安全なハイフンへ
        let name = ctx.resource_name("data_store");
        assert_eq!(name, format!("cpoker-data-store-{}", ctx.run_id()));

        // 大文字は小文字化される
        let name = ctx.resource_name("Web");
        assert_eq!(name, format!("cpoker-web-{}", ctx.run_id()));
    }

    /// 所有ラベルの内容
    #[test]
    fn test_labels() {
        let labels = context().labels();

        assert!(labels.contains(&("created-by".to_string(), "containerpoker".to_string())));
        assert!(labels.contains(&("educational".to_string(), "true".to_string())));
    }

    /// 追跡と種別ごとの参照
    #[test]
    fn test_track_and_lookup() {
        let mut ctx = context();
        ctx.track("db", container("cpoker-db-x"));
        ctx.track("net", network("cpoker-net-x"));
        ctx.track("data", volume("cpoker-data-x"));

        assert_eq!(ctx.len(), 3);
        assert_eq!(ctx.container("db").map(|h| h.name.as_str()), Some("cpoker-db-x"));
        assert_eq!(ctx.network("net").map(|h| h.name.as_str()), Some("cpoker-net-x"));
        assert_eq!(ctx.volume("data").map(|h| h.name.as_str()), Some("cpoker-data-x"));

        // 種別違いの参照は引っかからない
        assert!(ctx.container("net").is_none());
        assert!(ctx.network("db").is_none());

        assert_eq!(ctx.name_of("data"), Some("cpoker-data-x"));
        assert_eq!(ctx.name_of("unknown"), None);
        assert_eq!(ctx.tracked_keys(), vec!["db", "net", "data"]);
    }

    /// 全解放は作成の逆順で行われ、コンテナは停止してから削除される
    #[tokio::test]
    async fn test_release_all_in_reverse_order() {
        let engine = RecordingEngine::new();
        let mut ctx = context();
        ctx.track("net", network("n1"));
        ctx.track("db", container("c1"));
        ctx.track("app", container("c2"));

        let warnings = ctx.release_all(&engine).await;

        assert!(warnings.is_empty());
        assert!(ctx.is_empty());
        assert_eq!(
            engine.recorded(),
            vec![
                "stop:c2",
                "remove_container:c2",
                "stop:c1",
                "remove_container:c1",
                "remove_network:n1",
            ]
        );
    }

    /// 二度目の全解放は何もしない（冪等）
    #[tokio::test]
    async fn test_release_all_is_idempotent() {
        let engine = RecordingEngine::new();
        let mut ctx = context();
        ctx.track("demo", container("c1"));

        ctx.release_all(&engine).await;
        let count_after_first = engine.recorded().len();

        let warnings = ctx.release_all(&engine).await;

        assert!(warnings.is_empty());
        assert_eq!(engine.recorded().len(), count_after_first);
    }

    /// 解放失敗は警告になるだけで、他のリソースの解放は続行する
    #[tokio::test]
    async fn test_release_failure_is_best_effort() {
        let engine = RecordingEngine::failing();
        let mut ctx = context();
        ctx.track("net", network("n1"));
        ctx.track("demo", container("c1"));

        let warnings = ctx.release_all(&engine).await;

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("c1"));
        // コンテナの削除が失敗してもネットワークの解放へ進む
        assert!(engine.recorded().contains(&"remove_network:n1".to_string()));
        assert!(ctx.is_empty());
    }

    /// キー指定の解放は対象だけを台帳から外す
    #[tokio::test]
    async fn test_release_selected_keys() {
        let engine = RecordingEngine::new();
        let mut ctx = context();
        ctx.track("keep", container("c-keep"));
        ctx.track("drop", container("c-drop"));

        let warnings = ctx.release(&engine, &["drop".to_string()]).await;

        assert!(warnings.is_empty());
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.tracked_keys(), vec!["keep"]);
        assert_eq!(engine.recorded(), vec!["stop:c-drop", "remove_container:c-drop"]);
    }

    /// 途中で打ち切られた解放は未解放のリソースを台帳に残し、
    /// やり直しの解放で全件が削除されること
    #[tokio::test(start_paused = true)]
    async fn test_interrupted_release_keeps_unreleased_entries() {
        let engine = RecordingEngine::stalling();
        let mut ctx = context();
        ctx.track("db", container("c1"));
        ctx.track("app", container("c2"));

        // c2 の停止が返らないまま打ち切られる
        let interrupted =
            tokio::time::timeout(Duration::from_secs(1), ctx.release_all(&engine)).await;

        assert!(interrupted.is_err());
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.tracked_keys(), vec!["db", "app"]);

        let warnings = ctx.release_all(&engine).await;

        assert!(warnings.is_empty());
        assert!(ctx.is_empty());
        // c2 の停止だけが二度呼ばれ、削除はどちらも 1 回
        assert_eq!(
            engine.recorded(),
            vec![
                "stop:c2",
                "stop:c2",
                "remove_container:c2",
                "stop:c1",
                "remove_container:c1",
            ]
        );
    }

    #[test]
    fn test_untrack_removes_from_ledger_without_engine_calls() {
        let mut ctx = context();
        ctx.track("db", container("c-db"));
        ctx.track("app", container("c-app"));

        let handle = ctx.untrack("db").expect("db は追跡中のはず");

        assert_eq!(handle.name(), "c-db");
        assert_eq!(ctx.tracked_keys(), vec!["app"]);
        assert!(ctx.untrack("db").is_none());
    }
}
