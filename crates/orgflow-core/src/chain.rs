//! 依存チェーンの構築
//!
//! 宣言的な組織ツリーを、外部APIに渡す順序付きステップ列に変換します。
//! ステップは単一の連結リストを成し、兄弟ノード同士も直列化されます。
//!
//! 走査順序（各OUについて）:
//! 1. OU自身の作成/更新ステップ
//! 2. 直下のアカウント（記述順）
//! 3. 入れ子のOU（記述順、再帰）
//!
//! 組織全体のプランでは、各アカウントの直後に配置（OUへの移動）と
//! 委任管理者登録のステップが続きます。

use crate::email::{EmailAddress, EmailTemplate};
use crate::error::{CoreError, Result};
use crate::model::{
    Account, CONFIG_SERVICE_PRINCIPAL, Organization, OrganizationalUnit, SSM_SERVICE_PRINCIPAL,
    join_path,
};
use orgflow_cloud::{EntityKind, EntityRef, ParamValue, Plan, ProvisioningStep, StepVerb};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// ルートを参照するステップのエンティティパス
pub const ROOT_PATH: &str = "root";
/// 組織を参照するステップのエンティティパス
pub const ORGANIZATION_PATH: &str = "organization";

/// 組織作成直後に信頼されたアクセスを有効化するサービス（有効化順）
const SERVICE_ACCESS: [&str; 2] = [CONFIG_SERVICE_PRINCIPAL, SSM_SERVICE_PRINCIPAL];

/// ツリーからステップ列を生成するビルダー
#[derive(Debug, Clone, Default)]
pub struct ChainBuilder {
    template: Option<EmailTemplate>,
}

/// 構築中のチェーン
#[derive(Default)]
struct Chain {
    steps: Vec<ProvisioningStep>,
    seen: HashSet<String>,
    /// アカウントごとに配置・委任管理者登録のステップを続ける
    account_follow_ups: bool,
}

impl Chain {
    /// 直前のステップを先行ステップとして追加し、追加したステップのIDを返す
    fn push(&mut self, step: ProvisioningStep) -> Result<String> {
        if !self.seen.insert(step.id.clone()) {
            return Err(CoreError::DuplicatePath(step.target.path.clone()));
        }
        let predecessor = self.steps.last().map(|s| s.id.clone());
        let step = step.after(predecessor);
        let id = step.id.clone();
        debug!(step = %id, predecessor = ?step.predecessor, "Step emitted");
        self.steps.push(step);
        Ok(id)
    }
}

impl ChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// メール省略時のアカウントに使う合成テンプレートを設定
    pub fn with_email_template(mut self, template: EmailTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// OUツリーをステップ列に変換
    ///
    /// `root_parent` は第1階層のOUの親IDです。
    #[instrument(skip(self, units, root_parent), fields(unit_count = units.len()))]
    pub fn build(
        &self,
        units: &[OrganizationalUnit],
        root_parent: impl Into<ParamValue>,
    ) -> Result<Vec<ProvisioningStep>> {
        let mut chain = Chain::default();
        let root_parent = root_parent.into();
        for unit in units {
            self.emit_unit(&mut chain, unit, None, &root_parent)?;
        }
        info!(steps = chain.steps.len(), "Dependency chain built");
        Ok(chain.steps)
    }

    /// 組織全体のステップ列を生成
    ///
    /// ツリーの前に、メール検証（任意）・組織作成・サービスアクセス有効化・
    /// ルート取得のステップを置きます。
    #[instrument(skip_all)]
    pub fn build_organization(&self, organization: &Organization) -> Result<Vec<ProvisioningStep>> {
        let email = organization.email.as_deref().ok_or_else(|| {
            CoreError::Validation("管理アカウントのメールアドレスが指定されていません".to_string())
        })?;
        let root_email = EmailAddress::parse_root(email)?;

        let mut builder = self.clone();
        if builder.template.is_none() {
            builder.template = organization
                .management_account
                .as_ref()
                .map(|number| EmailTemplate::from_root(&root_email, number.clone()));
        }

        let mut chain = Chain {
            account_follow_ups: true,
            ..Default::default()
        };

        if organization.force_email_verification {
            let address = root_email.verification_address();
            chain.push(
                ProvisioningStep::new(
                    StepVerb::Create,
                    EntityRef::new(EntityKind::EmailIdentity, address.as_str()),
                )
                .with_param("EmailAddress", address),
            )?;
        }

        let target = EntityRef::new(EntityKind::Organization, ORGANIZATION_PATH);
        let organization_step = match &organization.id {
            Some(id) => ProvisioningStep::new(StepVerb::Update, target).with_prior_physical_id(id),
            None => ProvisioningStep::new(StepVerb::Create, target).with_param("FeatureSet", "ALL"),
        };
        let verb = organization_step.verb;
        chain.push(organization_step)?;

        for principal in SERVICE_ACCESS {
            chain.push(
                ProvisioningStep::new(verb, EntityRef::new(EntityKind::ServiceAccess, principal))
                    .with_param("ServicePrincipal", principal),
            )?;
        }

        let root_step = chain.push(ProvisioningStep::new(
            StepVerb::Create,
            EntityRef::new(EntityKind::Root, ROOT_PATH),
        ))?;

        let root_parent = ParamValue::EntityId(root_step);
        for unit in &organization.units {
            builder.emit_unit(&mut chain, unit, None, &root_parent)?;
        }

        info!(
            steps = chain.steps.len(),
            units = organization.unit_count(),
            accounts = organization.account_count(),
            "Organization chain built"
        );
        Ok(chain.steps)
    }

    /// 組織全体のプランを生成
    pub fn plan(&self, organization: &Organization) -> Result<Plan> {
        Ok(Plan::new(self.build_organization(organization)?)?)
    }

    fn emit_unit(
        &self,
        chain: &mut Chain,
        unit: &OrganizationalUnit,
        parent_path: Option<&str>,
        parent: &ParamValue,
    ) -> Result<()> {
        validate_name("OU", &unit.name)?;
        let path = join_path(parent_path, &unit.name);
        let target = EntityRef::new(EntityKind::Unit, path.as_str());

        let step = match &unit.id {
            Some(id) => ProvisioningStep::new(StepVerb::Update, target).with_prior_physical_id(id),
            None => ProvisioningStep::new(StepVerb::Create, target),
        }
        .with_param("Name", unit.name.as_str())
        .with_param("ParentId", parent.clone());

        let step_id = chain.push(step)?;

        // 既存のOUはIDが確定しているのでリテラルで参照
        let unit_ref = match &unit.id {
            Some(id) => ParamValue::Literal(id.clone()),
            None => ParamValue::EntityId(step_id),
        };

        for account in &unit.accounts {
            self.emit_account(chain, account, &path, &unit_ref)?;
        }
        for nested in &unit.units {
            self.emit_unit(chain, nested, Some(&path), &unit_ref)?;
        }
        Ok(())
    }

    fn emit_account(
        &self,
        chain: &mut Chain,
        account: &Account,
        unit_path: &str,
        parent: &ParamValue,
    ) -> Result<()> {
        validate_name("アカウント", &account.name)?;
        let email = self.account_email(account)?;
        let path = join_path(Some(unit_path), &account.name);
        let target = EntityRef::new(EntityKind::Account, path.as_str());

        let step = match &account.id {
            Some(id) => ProvisioningStep::new(StepVerb::Update, target).with_prior_physical_id(id),
            None => ProvisioningStep::new(StepVerb::Create, target),
        }
        .with_param("Email", email)
        .with_param("AccountName", account.name.as_str())
        .with_param("ParentId", parent.clone())
        .with_optional_param(
            "AccountType",
            account.account_type.map(|t| t.as_str().to_string()),
        )
        .with_optional_param("StageName", account.stage_name.clone())
        .with_optional_param("StageOrder", account.stage_order.map(|o| o.to_string()))
        .with_optional_param("HostedServices", account.hosted_services_tag());

        let verb = step.verb;
        let step_id = chain.push(step)?;
        if !chain.account_follow_ups {
            return Ok(());
        }

        let account_ref = match &account.id {
            Some(id) => ParamValue::Literal(id.clone()),
            None => ParamValue::EntityId(step_id),
        };

        // 作成直後のアカウントはルート直下にあるため、所属OUへ移動する
        chain.push(
            ProvisioningStep::new(verb, EntityRef::new(EntityKind::Placement, path.as_str()))
                .with_param("AccountId", account_ref.clone())
                .with_param("ParentId", parent.clone()),
        )?;
        chain.push(
            ProvisioningStep::new(verb, EntityRef::new(EntityKind::DelegatedAdmin, path.as_str()))
                .with_param("AccountId", account_ref)
                .with_param("ServicePrincipal", account.delegated_service_principal()),
        )?;
        Ok(())
    }

    fn account_email(&self, account: &Account) -> Result<String> {
        if let Some(email) = &account.email {
            EmailAddress::parse(email)?;
            return Ok(email.clone());
        }
        match &self.template {
            Some(template) => Ok(template.synthesize(&account.name)),
            None => Err(CoreError::Validation(format!(
                "アカウント '{}' のメールアドレスを決定できません（email もテンプレートもありません）",
                account.name
            ))),
        }
    }
}

fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(format!("{}名が空です", kind)));
    }
    if name.contains('/') {
        return Err(CoreError::Validation(format!(
            "{}名に '/' は使用できません: {}",
            kind, name
        )));
    }
    Ok(())
}
