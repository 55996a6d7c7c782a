//! メールアドレスの検証と合成
//!
//! アカウントのメールアドレスは外部システム全体で一意である必要があるため、
//! 省略時は管理アカウントのアドレスからサブアドレス付きで合成します。

use crate::error::{CoreError, Result};

/// `prefix@domain` に分解したメールアドレス
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    pub prefix: String,
    pub domain: String,
}

impl EmailAddress {
    /// メールアドレスをパース
    pub fn parse(email: &str) -> Result<Self> {
        let (prefix, domain) = email.split_once('@').ok_or_else(|| {
            CoreError::Validation(format!("メールアドレスの形式が不正です: {}", email))
        })?;

        if prefix.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(CoreError::Validation(format!(
                "メールアドレスの形式が不正です: {}",
                email
            )));
        }

        Ok(Self {
            prefix: prefix.to_string(),
            domain: domain.to_string(),
        })
    }

    /// 管理アカウント（ルート）のメールアドレスをパース
    ///
    /// サブアドレスの合成元になるため "+" を含むアドレスは拒否します。
    pub fn parse_root(email: &str) -> Result<Self> {
        let address = Self::parse(email)?;
        if address.prefix.contains('+') {
            return Err(CoreError::Validation(format!(
                "ルートアカウントのメールアドレスに '+' は使用できません: {}",
                email
            )));
        }
        Ok(address)
    }

    /// 組織作成前に検証するアドレス（`{prefix}+aws@{domain}`）
    pub fn verification_address(&self) -> String {
        format!("{}+aws@{}", self.prefix, self.domain)
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.prefix, self.domain)
    }
}

/// アカウントメールの合成テンプレート
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailTemplate {
    pub prefix: String,
    pub domain: String,
    pub account_number: String,
}

impl EmailTemplate {
    pub fn new(
        prefix: impl Into<String>,
        domain: impl Into<String>,
        account_number: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            domain: domain.into(),
            account_number: account_number.into(),
        }
    }

    /// ルートのアドレスと管理アカウント番号から作成
    pub fn from_root(root: &EmailAddress, account_number: impl Into<String>) -> Self {
        Self::new(root.prefix.clone(), root.domain.clone(), account_number)
    }

    /// `{prefix}+{accountName}-{accountNumber}@{domain}`
    pub fn synthesize(&self, account_name: &str) -> String {
        format!(
            "{}+{}-{}@{}",
            self.prefix, account_name, self.account_number, self.domain
        )
    }
}
