pub mod error;
pub mod settings;

pub use error::*;
pub use settings::*;

use std::path::{Path, PathBuf};

/// 組織ツリーファイルを直接指定する環境変数
pub const ENV_TREE_PATH: &str = "ORGFLOW_TREE_PATH";

/// 組織ツリーファイルの候補（優先順）
pub const TREE_FILE_CANDIDATES: [&str; 2] = ["org.local.yaml", "org.yaml"];

/// 組織ツリーファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 ORGFLOW_TREE_PATH (直接パス指定)
/// 2. カレントディレクトリ: org.local.yaml, org.yaml
/// 3. ./.orgflow/ ディレクトリ内: 同様の順序
/// 4. ~/.config/orgflow/org.yaml (グローバル設定)
pub fn find_tree_file() -> Result<PathBuf> {
    if let Ok(tree_path) = std::env::var(ENV_TREE_PATH) {
        let path = PathBuf::from(tree_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(
            path = %path.display(),
            "ORGFLOW_TREE_PATH does not exist, searching defaults"
        );
    }

    let current_dir = std::env::current_dir()?;
    tree_file_candidates(&current_dir)
        .into_iter()
        .find(|path| path.is_file())
        .ok_or(ConfigError::TreeFileNotFound)
}

/// `base` を起点にした探索候補（優先順）
pub fn tree_file_candidates(base: &Path) -> Vec<PathBuf> {
    // 状態ファイルと同じ .orgflow/ に置かれている場合も拾う
    let local_dirs = [base.to_path_buf(), base.join(".orgflow")];
    let mut candidates: Vec<PathBuf> = local_dirs
        .iter()
        .flat_map(|dir| TREE_FILE_CANDIDATES.iter().map(move |name| dir.join(name)))
        .collect();

    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join("orgflow").join("org.yaml"));
    }
    candidates
}
