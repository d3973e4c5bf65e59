//! エラー型の定義
//!
//! このモジュールは、Container Poker 全体で使用される基盤エラー型を定義します。
//! フロー実行層のエラー（`ExecutionError`）は `engine::result` で定義されます。

use thiserror::Error;

/// 設定関連のエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    /// ファイルの読み込みに失敗
    #[error("設定ファイルの読み込みに失敗しました: {0}")]
    FileRead(#[from] std::io::Error),

    /// TOML のデシリアライズに失敗
    #[error("TOML のデシリアライズに失敗しました: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    /// バリデーションエラー
    #[error("設定のバリデーションに失敗しました: {0}")]
    Validation(String),
}

/// コンテナエンジン操作のエラー
///
/// エンジン CLI の標準エラー出力を分類した型です。各カテゴリは
/// [`EngineError::hint`] で学習者向けのヒントに対応付けられます。
#[derive(Debug, Error)]
pub enum EngineError {
    /// エンジン CLI が見つからない
    #[error("コンテナエンジンの CLI `{0}` が見つかりません")]
    CliNotFound(String),

    /// デーモンに接続できない
    #[error("コンテナエンジンのデーモンに接続できません: {0}")]
    DaemonUnreachable(String),

    /// コンテナが存在しない
    #[error("コンテナが見つかりません: {0}")]
    ContainerNotFound(String),

    /// イメージが存在しない
    #[error("イメージが見つかりません: {0}")]
    ImageNotFound(String),

    /// 権限不足
    #[error("権限がありません: {0}")]
    PermissionDenied(String),

    /// ポートが既に使用されている
    #[error("ポートが既に割り当てられています: {0}")]
    PortAllocated(String),

    /// 同名のリソースが既に存在する
    #[error("リソースが既に存在します: {0}")]
    AlreadyExists(String),

    /// 上記のいずれにも分類できない CLI の失敗
    #[error("エンジンコマンドが失敗しました (exit code {code:?}): {stderr}")]
    CommandFailed {
        /// CLI プロセスの終了コード
        code: Option<i32>,
        /// 標準エラー出力（原文のまま）
        stderr: String,
    },

    /// CLI の出力が期待した形式ではない
    #[error("エンジンの応答を解釈できません: {0}")]
    InvalidResponse(String),

    /// プロセス起動などの I/O エラー
    #[error("I/O エラー: {0}")]
    Io(#[from] std::io::Error),

    /// CLI 出力が UTF-8 ではない
    #[error("エンジン出力のデコードに失敗しました: {0}")]
    OutputEncoding(#[from] std::string::FromUtf8Error),
}

impl EngineError {
    /// 標準エラー出力からエラーカテゴリを判定
    ///
    /// Docker 互換 CLI のエラーメッセージを小文字化し、既知のフレーズで
    /// 分類します。どれにも一致しない場合は
    /// [`EngineError::CommandFailed`] になります。
    ///
    /// # 引数
    ///
    /// - `stderr`: CLI の標準エラー出力
    /// - `code`: CLI プロセスの終了コード
    pub fn from_stderr(stderr: &str, code: Option<i32>) -> Self {
        let lower = stderr.to_lowercase();

        if lower.contains("cannot connect to the docker daemon")
            || lower.contains("is the docker daemon running")
            || lower.contains("cannot connect to podman")
            || lower.contains("connection refused")
        {
            return EngineError::DaemonUnreachable(stderr.trim().to_string());
        }

        if lower.contains("permission denied") {
            return EngineError::PermissionDenied(stderr.trim().to_string());
        }

        if lower.contains("port is already allocated")
            || lower.contains("address already in use")
        {
            return EngineError::PortAllocated(stderr.trim().to_string());
        }

        if lower.contains("already in use") || lower.contains("already exists") {
            return EngineError::AlreadyExists(stderr.trim().to_string());
        }

        if lower.contains("no such image")
            || lower.contains("unable to find image")
            || lower.contains("pull access denied")
            || lower.contains("manifest unknown")
        {
            return EngineError::ImageNotFound(stderr.trim().to_string());
        }

        if lower.contains("no such container")
            || lower.contains("no such object")
            || lower.contains("no such network")
            || lower.contains("no such volume")
        {
            return EngineError::ContainerNotFound(stderr.trim().to_string());
        }

        EngineError::CommandFailed {
            code,
            stderr: stderr.trim().to_string(),
        }
    }

    /// エラーカテゴリに応じた学習者向けヒント
    ///
    /// ダッシュボードや CLI の出力にそのまま表示できる、次の一手を示す
    /// 文字列を返します。分類不能なエラーには汎用のヒントを返します。
    ///
    /// # 例
    ///
    /// ```
    /// use container_poker::error::EngineError;
    ///
    /// let err = EngineError::from_stderr(
    ///     "Cannot connect to the Docker daemon at unix:///var/run/docker.sock",
    ///     Some(1),
    /// );
    /// assert!(err.hint().unwrap().contains("デーモン"));
    /// ```
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            EngineError::CliNotFound(_) => Some(
                "Docker または Podman がインストールされ、PATH に含まれているか確認してください",
            ),
            EngineError::DaemonUnreachable(_) => Some(
                "コンテナエンジンのデーモンは起動していますか? `systemctl start docker` で起動できます",
            ),
            EngineError::ContainerNotFound(_) => Some(
                "対象のリソースは既に削除された可能性があります。`docker ps -a` で全コンテナを確認してください",
            ),
            EngineError::ImageNotFound(_) => Some(
                "イメージ名とタグを確認してください。`docker pull <イメージ名>` で事前に取得すると原因を切り分けられます",
            ),
            EngineError::PermissionDenied(_) => Some(
                "Docker ソケットへのアクセス権を確認してください。`sudo usermod -aG docker $USER` の後、再ログインが必要です",
            ),
            EngineError::PortAllocated(_) => Some(
                "ポートが他のプロセスに使用されています。`lsof -i :<ポート番号>` で使用元を特定してください",
            ),
            EngineError::AlreadyExists(_) => Some(
                "同名のリソースが残っています。前回の実行が中断された場合は、残ったコンテナやネットワークを削除してください",
            ),
            EngineError::CommandFailed { .. } => Some(
                "エラーメッセージ全文とコンテナのログを確認してください。`docker ps -a` で状態を見ると手がかりになります",
            ),
            EngineError::InvalidResponse(_)
            | EngineError::Io(_)
            | EngineError::OutputEncoding(_) => None,
        }
    }

    /// デーモン接続系のエラーかどうか
    ///
    /// 到達性の問題はリトライや環境確認で解決することが多いため、
    /// 呼び出し側が区別できるようにしています。
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            EngineError::DaemonUnreachable(_) | EngineError::CliNotFound(_)
        )
    }

    /// 対象リソースの不在を示すエラーかどうか
    ///
    /// クリーンアップでは「既に無い」は成功と同義に扱えます。
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::ContainerNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// デーモン未起動のメッセージが DaemonUnreachable に分類されること
    #[test]
    fn test_classify_daemon_unreachable() {
        let err = EngineError::from_stderr(
            "Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?",
            Some(1),
        );
        assert!(matches!(err, EngineError::DaemonUnreachable(_)));
        assert!(err.is_unreachable());
    }

    /// 権限エラーの分類
    #[test]
    fn test_classify_permission_denied() {
        let err = EngineError::from_stderr(
            "Got permission denied while trying to connect to the Docker daemon socket",
            Some(1),
        );
        assert!(matches!(err, EngineError::PermissionDenied(_)));
    }

    /// ポート重複の分類
    #[test]
    fn test_classify_port_allocated() {
        let err = EngineError::from_stderr(
            "Error response from daemon: driver failed programming external connectivity: Bind for 0.0.0.0:8080 failed: port is already allocated",
            Some(125),
        );
        assert!(matches!(err, EngineError::PortAllocated(_)));
    }

    /// イメージ不在とコンテナ不在が別カテゴリになること
    #[test]
    fn test_classify_not_found_kinds() {
        let image = EngineError::from_stderr(
            "Unable to find image 'ubnutu:latest' locally",
            Some(125),
        );
        assert!(matches!(image, EngineError::ImageNotFound(_)));

        let container = EngineError::from_stderr(
            "Error response from daemon: No such container: hello_world_demo",
            Some(1),
        );
        assert!(matches!(container, EngineError::ContainerNotFound(_)));
        assert!(container.is_not_found());
        assert!(!image.is_not_found());
    }

    /// 名前衝突の分類
    #[test]
    fn test_classify_already_exists() {
        let err = EngineError::from_stderr(
            "Error response from daemon: Conflict. The container name \"/demo_db\" is already in use",
            Some(125),
        );
        assert!(matches!(err, EngineError::AlreadyExists(_)));
    }

    /// 未知のメッセージは CommandFailed にフォールバックすること
    #[test]
    fn test_classify_fallback() {
        let err = EngineError::from_stderr("something inexplicable happened", Some(2));
        match err {
            EngineError::CommandFailed { code, stderr } => {
                assert_eq!(code, Some(2));
                assert_eq!(stderr, "something inexplicable happened");
            }
            other => panic!("予期しない分類: {:?}", other),
        }
    }

    /// 分類済みカテゴリには必ずヒントが付くこと
    #[test]
    fn test_hint_presence() {
        let cases = [
            EngineError::from_stderr("permission denied", None),
            EngineError::from_stderr("No such container: x", None),
            EngineError::from_stderr("port is already allocated", None),
            EngineError::from_stderr("Is the docker daemon running?", None),
            EngineError::from_stderr("totally unknown", None),
        ];
        for err in cases {
            assert!(err.hint().is_some(), "ヒントがありません: {:?}", err);
        }
    }

    /// メッセージ原文が保持されること
    #[test]
    fn test_verbatim_message_preserved() {
        let raw = "Error response from daemon: No such container: demo_db";
        let err = EngineError::from_stderr(raw, Some(1));
        assert!(err.to_string().contains("demo_db"));
    }
}
