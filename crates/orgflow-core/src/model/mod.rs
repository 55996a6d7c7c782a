//! モデル定義
//!
//! 組織ツリー（組織・OU・アカウント）のデータモデルを定義します。

mod account;
mod organization;
mod unit;

// Re-exports
pub use account::*;
pub use organization::*;
pub use unit::*;

/// ツリー内のパスを連結（例: "SDLC/Nested"）
pub(crate) fn join_path(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) => format!("{}/{}", parent, name),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_organization_counts() {
        let organization = Organization {
            email: Some("test@test.com".to_string()),
            units: vec![
                OrganizationalUnit::new("SDLC")
                    .with_account(Account::new("Account1"))
                    .with_account(Account::new("Account2"))
                    .with_unit(
                        OrganizationalUnit::new("Sandbox").with_account(Account::new("Dev")),
                    ),
                OrganizationalUnit::new("Prod").with_account(Account::new("Account3")),
            ],
            ..Default::default()
        };

        assert_eq!(organization.unit_count(), 3);
        assert_eq!(organization.account_count(), 4);
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path(None, "SDLC"), "SDLC");
        assert_eq!(join_path(Some("SDLC"), "Sandbox"), "SDLC/Sandbox");
    }
}
