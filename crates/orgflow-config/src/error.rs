use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "組織ツリーファイルが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: org.local.yaml, org.yaml\n\
        - ./.orgflow/ ディレクトリ\n\
        - ~/.config/orgflow/org.yaml\n\
        または ORGFLOW_TREE_PATH 環境変数で直接指定できます"
    )]
    TreeFileNotFound,

    #[error("環境変数 {name} の値が不正です: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
