//! orgflow-core
//!
//! 組織ツリー（OU・アカウント）の宣言的モデルと、
//! それを順序付きプロビジョニングステップに変換する依存チェーンビルダー。

pub mod chain;
pub mod email;
pub mod error;
pub mod loader;
pub mod model;

pub use chain::{ChainBuilder, ORGANIZATION_PATH, ROOT_PATH};
pub use email::{EmailAddress, EmailTemplate};
pub use error::{CoreError, Result};
pub use loader::{load_organization, parse_organization};
pub use model::*;
