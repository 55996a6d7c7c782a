mod commands;
mod utils;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "orgflow")]
#[command(about = "宣言した組織ツリーを、順番どおりにAWS Organizationsへ。", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 組織ツリーを検証
    Validate {
        /// 組織ツリーファイル（省略時は自動検出）
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// 実行計画（ステップチェーン）を表示
    Plan {
        /// 組織ツリーファイル（省略時は自動検出）
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// 組織ツリーをプロビジョニング
    Apply {
        /// 組織ツリーファイル（省略時は自動検出）
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// 状態ファイル (.orgflow/) を置くディレクトリ
        #[arg(short = 'C', long, default_value = ".")]
        project_dir: PathBuf,
        /// 確定したIDを組織ツリーファイルに書き戻す
        #[arg(long)]
        write_ids: bool,
    },
    /// 記録されたプロビジョニング結果を表示
    Status {
        /// 状態ファイル (.orgflow/) のあるディレクトリ
        #[arg(short = 'C', long, default_value = ".")]
        project_dir: PathBuf,
        /// JSONで出力
        #[arg(long)]
        json: bool,
    },
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ログはstderrに出力（stdoutは結果表示に使う）
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    match cli.command {
        Commands::Validate { file } => commands::validate::handle(file),
        Commands::Plan { file } => commands::plan::handle(file),
        Commands::Apply {
            file,
            project_dir,
            write_ids,
        } => commands::apply::handle(file, &project_dir, write_ids).await,
        Commands::Status { project_dir, json } => {
            commands::status::handle(&project_dir, json).await
        }
        Commands::Version => {
            println!("orgflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
