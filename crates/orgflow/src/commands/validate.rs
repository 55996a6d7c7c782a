use crate::utils;
use colored::Colorize;
use std::path::PathBuf;

pub fn handle(file: Option<PathBuf>) -> anyhow::Result<()> {
    println!("{}", "組織ツリーを検証中...".blue());

    let path = match utils::resolve_tree_path(file) {
        Ok(path) => path,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ 組織ツリーファイルが見つかりません".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };
    utils::print_tree_file(&path);

    match utils::load_plan(&path) {
        Ok((organization, plan)) => {
            println!("{}", "✓ 組織ツリーは正常です！".green().bold());
            println!();
            println!("サマリー:");
            println!("  OU: {}個", organization.unit_count());
            println!("  アカウント: {}個", organization.account_count());
            println!("  ステップ: {}個 ({})", plan.len(), plan.summary());
        }
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ 検証エラー".red().bold());
            eprintln!("  {:#}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
