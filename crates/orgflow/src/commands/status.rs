use crate::utils;
use colored::Colorize;
use orgflow_cloud::StateManager;
use std::path::Path;

pub async fn handle(project_dir: &Path, json: bool) -> anyhow::Result<()> {
    let result = StateManager::new(project_dir).load().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result.outcomes())?);
        return Ok(());
    }

    if result.steps.is_empty() {
        println!("{}", "プロビジョニングの記録がありません".yellow());
        return Ok(());
    }

    println!("最終更新: {}", result.updated_at.to_rfc3339().cyan());
    utils::print_result(&result);
    Ok(())
}
