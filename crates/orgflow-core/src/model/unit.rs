//! 組織単位（OU）定義

use super::account::Account;
use serde::{Deserialize, Serialize};

/// 組織単位（Organizational Unit）
///
/// アカウントと入れ子のOUを持つツリーのノード。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationalUnit {
    /// OU名
    pub name: String,
    /// このOUに所属するアカウント（記述順に作成）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accounts: Vec<Account>,
    /// 入れ子のOU（記述順に作成）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub units: Vec<OrganizationalUnit>,
    /// OU ID（作成完了後に確定し、以後変更しない）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// 親（ルートまたはOU）のID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl OrganizationalUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_account(mut self, account: Account) -> Self {
        self.accounts.push(account);
        self
    }

    pub fn with_unit(mut self, unit: OrganizationalUnit) -> Self {
        self.units.push(unit);
        self
    }

    /// このOU自身と配下のOUの数
    pub fn unit_count(&self) -> usize {
        1 + self.units.iter().map(|u| u.unit_count()).sum::<usize>()
    }

    /// 配下すべてのアカウント数
    pub fn account_count(&self) -> usize {
        self.accounts.len() + self.units.iter().map(|u| u.account_count()).sum::<usize>()
    }
}
