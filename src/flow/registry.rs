//! フローレジストリ
//!
//! # 責務
//!
//! - 名前 → フロー定義の静的カタログを保持
//! - 登録順を保った一覧と名前での取得を提供
//!
//! レジストリはプロセス起動時に一度だけ構築され、以後は読み取り専用です。
//! 組み込みカタログの内容は `flow::builtin` が定義します。
//!
//! # 使用例
//!
//! ```
//! use container_poker::flow::FlowRegistry;
//!
//! let registry = FlowRegistry::builtin();
//!
//! // 一覧は登録順
//! let ids: Vec<String> = registry.list().into_iter().map(|s| s.id).collect();
//! assert_eq!(ids.first().map(String::as_str), Some("hello_world"));
//!
//! // 名前で取得
//! assert!(registry.get("hello_world").is_some());
//! assert!(registry.get("no_such_flow").is_none());
//! ```

use super::builtin;
use super::definition::{Flow, FlowSummary};
use crate::error::ConfigError;

/// フローの静的カタログ
#[derive(Debug)]
pub struct FlowRegistry {
    /// 登録順のフロー定義
    flows: Vec<Flow>,
}

impl FlowRegistry {
    /// 組み込みの教材フロー一式でレジストリを構築する
    ///
    /// 組み込みカタログの整合性はユニットテストで検証されているため、
    /// ここでは再検証しません。
    pub fn builtin() -> Self {
        Self {
            flows: builtin::builtin_flows(),
        }
    }

    /// 任意のフロー集合からレジストリを構築する
    ///
    /// 各フローの定義検証と ID の一意性確認を行います。
    ///
    /// # エラー
    ///
    /// - [`ConfigError::Validation`] - 定義不正または ID 重複
    pub fn with_flows(flows: Vec<Flow>) -> Result<Self, ConfigError> {
        for (index, flow) in flows.iter().enumerate() {
            flow.validate()?;
            if flows[..index].iter().any(|f| f.name == flow.name) {
                return Err(ConfigError::Validation(format!(
                    "フロー ID が重複しています: \"{}\"",
                    flow.name
                )));
            }
        }
        Ok(Self { flows })
    }

    /// 登録順のフロー一覧を返す
    pub fn list(&self) -> Vec<FlowSummary> {
        self.flows.iter().map(Flow::summary).collect()
    }

    /// 名前でフローを取得する
    pub fn get(&self, name: &str) -> Option<&Flow> {
        self.flows.iter().find(|flow| flow.name == name)
    }

    /// 登録されているフロー数
    pub fn len(&self) -> usize {
        self.flows.len()
    }

    /// フローが 1 件もないか
    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

impl Default for FlowRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::definition::Difficulty;
    use crate::flow::step::{EngineAction, FlowStep};
    use crate::runtime::ContainerSpec;

    fn minimal_flow(name: &str) -> Flow {
        Flow::new(name, name, "desc", Difficulty::Beginner, "engine-api").steps(vec![
            FlowStep::action(
                "create",
                EngineAction::CreateContainer {
                    key: "demo".to_string(),
                    spec: ContainerSpec {
                        image: "alpine:latest".to_string(),
                        ..ContainerSpec::default()
                    },
                },
            ),
        ])
    }

    /// 一覧が登録順を保つこと
    #[test]
    fn test_list_preserves_registration_order() {
        let registry =
            FlowRegistry::with_flows(vec![minimal_flow("zebra"), minimal_flow("alpha")])
                .unwrap();

        let ids: Vec<String> = registry.list().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["zebra", "alpha"]);
    }

    /// 名前での取得と不在時の None
    #[test]
    fn test_get() {
        let registry = FlowRegistry::with_flows(vec![minimal_flow("alpha")]).unwrap();
        assert!(registry.get("alpha").is_some());
        assert!(registry.get("beta").is_none());
    }

    /// ID 重複が拒否されること
    #[test]
    fn test_duplicate_id_rejected() {
        let result =
            FlowRegistry::with_flows(vec![minimal_flow("same"), minimal_flow("same")]);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    /// 定義不正なフローが構築時に拒否されること
    #[test]
    fn test_invalid_flow_rejected() {
        let mut flow = minimal_flow("broken");
        flow.steps.clear();
        assert!(FlowRegistry::with_flows(vec![flow]).is_err());
    }

    /// 組み込みカタログが空でないこと
    #[test]
    fn test_builtin_not_empty() {
        let registry = FlowRegistry::builtin();
        assert!(!registry.is_empty());
        assert_eq!(registry.len(), registry.list().len());
    }
}
