//! 組織定義

use super::join_path;
use super::unit::OrganizationalUnit;
use crate::chain::{ORGANIZATION_PATH, ROOT_PATH};
use orgflow_cloud::{EntityKind, EntityRef, ProvisioningResult};
use serde::{Deserialize, Serialize};

/// 組織全体の宣言的定義
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// 管理アカウントのメールアドレス（"+" を含めない）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// 管理アカウント番号（アカウントメールの合成に使用）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_account: Option<String>,
    /// 組織作成前にメールアドレスの検証を行う
    #[serde(default)]
    pub force_email_verification: bool,
    /// 既存組織のID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// ルート直下のOU
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub units: Vec<OrganizationalUnit>,
}

impl Organization {
    pub fn unit_count(&self) -> usize {
        self.units.iter().map(|u| u.unit_count()).sum()
    }

    pub fn account_count(&self) -> usize {
        self.units.iter().map(|u| u.account_count()).sum()
    }

    /// 完了したステップのIDをツリーに書き戻す
    ///
    /// 既に確定しているIDは上書きしない。戻り値は新たに確定したIDの数。
    pub fn assign_ids(&mut self, result: &ProvisioningResult) -> usize {
        let mut assigned = 0;

        if self.id.is_none() {
            let key = EntityRef::new(EntityKind::Organization, ORGANIZATION_PATH).key();
            if let Some(id) = result.entity_id_for(&key) {
                self.id = Some(id.to_string());
                assigned += 1;
            }
        }

        let root_key = EntityRef::new(EntityKind::Root, ROOT_PATH).key();
        let root_id = result.entity_id_for(&root_key).map(str::to_string);
        for unit in &mut self.units {
            assigned += assign_unit(unit, None, root_id.as_deref(), result);
        }
        assigned
    }
}

fn assign_unit(
    unit: &mut OrganizationalUnit,
    parent_path: Option<&str>,
    parent_id: Option<&str>,
    result: &ProvisioningResult,
) -> usize {
    let path = join_path(parent_path, &unit.name);
    let mut assigned = 0;

    if unit.id.is_none() {
        let key = EntityRef::new(EntityKind::Unit, path.as_str()).key();
        if let Some(id) = result.entity_id_for(&key) {
            unit.id = Some(id.to_string());
            assigned += 1;
        }
    }
    if unit.parent_id.is_none() && unit.id.is_some() {
        unit.parent_id = parent_id.map(str::to_string);
    }

    for account in &mut unit.accounts {
        if account.id.is_none() {
            let key =
                EntityRef::new(EntityKind::Account, join_path(Some(&path), &account.name)).key();
            if let Some(id) = result.entity_id_for(&key) {
                account.id = Some(id.to_string());
                assigned += 1;
            }
        }
        if account.parent_id.is_none() && account.id.is_some() {
            account.parent_id = unit.id.clone();
        }
    }

    let unit_id = unit.id.clone();
    for nested in &mut unit.units {
        assigned += assign_unit(nested, Some(&path), unit_id.as_deref(), result);
    }
    assigned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Account;
    use orgflow_cloud::StepRecord;

    #[test]
    fn test_assign_ids_from_result() {
        let mut organization = Organization {
            units: vec![OrganizationalUnit::new("SDLC")
                .with_account(Account::new("Account1"))
                .with_unit(OrganizationalUnit::new("Sandbox"))],
            ..Default::default()
        };

        let mut result = ProvisioningResult::new();
        result.set(
            "create-root:root",
            StepRecord::complete(0, "root:root", Some("r-1".to_string())),
        );
        result.set(
            "create-unit:SDLC",
            StepRecord::complete(1, "unit:SDLC", Some("ou-sdlc".to_string())),
        );
        result.set(
            "create-account:SDLC/Account1",
            StepRecord::complete(2, "account:SDLC/Account1", Some("111".to_string())),
        );
        result.set(
            "create-unit:SDLC/Sandbox",
            StepRecord::skipped(3, "unit:SDLC/Sandbox"),
        );

        assert_eq!(organization.assign_ids(&result), 2);

        let sdlc = &organization.units[0];
        assert_eq!(sdlc.id.as_deref(), Some("ou-sdlc"));
        assert_eq!(sdlc.parent_id.as_deref(), Some("r-1"));
        assert_eq!(sdlc.accounts[0].id.as_deref(), Some("111"));
        assert_eq!(sdlc.accounts[0].parent_id.as_deref(), Some("ou-sdlc"));
        assert_eq!(sdlc.units[0].id, None);
    }

    #[test]
    fn test_assign_ids_never_overwrites() {
        let mut organization = Organization {
            units: vec![OrganizationalUnit {
                id: Some("ou-original".to_string()),
                ..OrganizationalUnit::new("SDLC")
            }],
            ..Default::default()
        };

        let mut result = ProvisioningResult::new();
        result.set(
            "update-unit:SDLC",
            StepRecord::complete(0, "unit:SDLC", Some("ou-other".to_string())),
        );

        assert_eq!(organization.assign_ids(&result), 0);
        assert_eq!(organization.units[0].id.as_deref(), Some("ou-original"));
    }
}
