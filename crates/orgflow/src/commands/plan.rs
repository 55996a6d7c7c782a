use crate::utils;
use colored::Colorize;
use std::path::PathBuf;

pub fn handle(file: Option<PathBuf>) -> anyhow::Result<()> {
    let path = utils::resolve_tree_path(file)?;
    utils::print_tree_file(&path);

    let (_, plan) = match utils::load_plan(&path) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{}", "✗ プランを生成できません".red().bold());
            eprintln!("  {:#}", e);
            std::process::exit(1);
        }
    };

    println!();
    println!("{}", "実行計画:".bold());
    for (index, step) in plan.steps.iter().enumerate() {
        let after = step
            .predecessor
            .as_deref()
            .map(|p| format!("  ← {}", p))
            .unwrap_or_default();
        println!("  {:>3}. {}{}", index + 1, step.id.cyan(), after.dimmed());

        if let Some(id) = &step.prior_physical_id {
            println!("         既存ID = {}", id);
        }
        for (name, value) in &step.parameters {
            println!("         {} = {}", name, utils::format_param(value));
        }
    }

    println!();
    println!("{}", plan.summary().to_string().bold());
    Ok(())
}
