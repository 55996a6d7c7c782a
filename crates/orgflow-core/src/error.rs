use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("YAMLパースエラー: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO エラー: {path}\n理由: {message}")]
    IoError { path: PathBuf, message: String },

    /// 外部呼び出し前に検出されるパラメータ不備
    #[error("検証エラー: {0}")]
    Validation(String),

    #[error("パスが重複しています: {0}")]
    DuplicatePath(String),

    #[error("プラン生成エラー: {0}")]
    Plan(#[from] orgflow_cloud::CloudError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
