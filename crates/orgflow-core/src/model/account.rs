//! アカウント定義

use serde::{Deserialize, Serialize};

/// CICDアカウントを委任管理者として登録するサービス
pub const SSM_SERVICE_PRINCIPAL: &str = "ssm.amazonaws.com";
/// CICD以外のアカウントを委任管理者として登録するサービス
pub const CONFIG_SERVICE_PRINCIPAL: &str = "config-multiaccountsetup.amazonaws.com";

/// アカウント種別（CI/CDパイプラインのステージ順序決定に使用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountType {
    /// パイプラインを実行するアカウント
    Cicd,
    /// デプロイ先ステージ
    Stage,
    /// 検証用の自由なアカウント
    Playground,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cicd => "CICD",
            Self::Stage => "STAGE",
            Self::Playground => "PLAYGROUND",
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// メンバーアカウント定義
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// アカウント名
    pub name: String,
    /// メールアドレス（省略時は管理アカウントのメールから合成）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// アカウント種別
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub account_type: Option<AccountType>,
    /// CI/CDパイプラインでのステージ名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_name: Option<String>,
    /// ステージのデプロイ順序
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_order: Option<u32>,
    /// このアカウントでホストするサービス（専用アカウントを持たない場合は ["ALL"]）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosted_services: Vec<String>,
    /// アカウントID（作成完了後に確定し、以後変更しない）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// 所属OUのID（作成完了後に確定）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Account {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_type(mut self, account_type: AccountType) -> Self {
        self.account_type = Some(account_type);
        self
    }

    pub fn with_stage(mut self, name: impl Into<String>, order: u32) -> Self {
        self.stage_name = Some(name.into());
        self.stage_order = Some(order);
        self
    }

    pub fn with_hosted_services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosted_services = services.into_iter().map(Into::into).collect();
        self
    }

    /// 委任管理者として登録する先のサービスプリンシパル
    ///
    /// サービスごとの委任管理者数には上限があるため、CICDとそれ以外で分けます。
    pub fn delegated_service_principal(&self) -> &'static str {
        match self.account_type {
            Some(AccountType::Cicd) => SSM_SERVICE_PRINCIPAL,
            _ => CONFIG_SERVICE_PRINCIPAL,
        }
    }

    /// タグ用に連結したホストサービス（例: "app1:app2"）
    pub fn hosted_services_tag(&self) -> Option<String> {
        if self.hosted_services.is_empty() {
            None
        } else {
            Some(self.hosted_services.join(":"))
        }
    }
}
