//! 組織ツリーのローダー
//!
//! YAMLファイルから [`Organization`] を読み込みます。

use crate::error::{CoreError, Result};
use crate::model::Organization;
use std::path::Path;
use tracing::{debug, info, instrument};

/// ファイルから組織ツリーを読み込む
#[instrument(skip(path), fields(path = %path.display()))]
pub fn load_organization(path: &Path) -> Result<Organization> {
    debug!("Reading tree file");
    let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let organization = parse_organization(&content)?;
    info!(
        units = organization.unit_count(),
        accounts = organization.account_count(),
        "Organization tree loaded"
    );
    Ok(organization)
}

/// YAML文字列から組織ツリーをパース
pub fn parse_organization(content: &str) -> Result<Organization> {
    let organization: Organization = serde_yaml::from_str(content)?;
    Ok(organization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AccountType;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TREE: &str = r#"
email: test@test.com
management_account: "111111111111"
units:
  - name: SDLC
    accounts:
      - name: Account1
      - name: Account2
        type: STAGE
        stage_name: staging
        stage_order: 1
        hosted_services: [app1, app2]
    units:
      - name: Sandbox
  - name: Prod
    id: ou-prod
    accounts:
      - name: Account3
        email: prod@test.com
"#;

    #[test]
    fn test_parse_organization() {
        let organization = parse_organization(TREE).unwrap();

        assert_eq!(organization.email.as_deref(), Some("test@test.com"));
        assert_eq!(organization.management_account.as_deref(), Some("111111111111"));
        assert!(!organization.force_email_verification);
        assert_eq!(organization.unit_count(), 3);
        assert_eq!(organization.account_count(), 3);

        let sdlc = &organization.units[0];
        assert_eq!(sdlc.accounts[1].account_type, Some(AccountType::Stage));
        assert_eq!(sdlc.accounts[1].stage_order, Some(1));
        assert_eq!(sdlc.accounts[1].hosted_services, vec!["app1", "app2"]);
        assert_eq!(sdlc.units[0].name, "Sandbox");

        let prod = &organization.units[1];
        assert_eq!(prod.id.as_deref(), Some("ou-prod"));
        assert_eq!(prod.accounts[0].email.as_deref(), Some("prod@test.com"));
    }

    #[test]
    fn test_load_organization_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(TREE.as_bytes()).unwrap();

        let organization = load_organization(file.path()).unwrap();
        assert_eq!(organization.units.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_organization(Path::new("/nonexistent/org.yaml")).unwrap_err();
        assert!(matches!(err, CoreError::IoError { .. }));
    }

    #[test]
    fn test_invalid_account_type() {
        let yaml = "units:\n  - name: SDLC\n    accounts:\n      - name: A\n        type: PROD\n";
        assert!(matches!(parse_organization(yaml), Err(CoreError::Yaml(_))));
    }
}
