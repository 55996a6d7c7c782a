use crate::utils;
use anyhow::Context;
use colored::Colorize;
use orgflow_cloud::{StateManager, TreeOrchestrator};
use orgflow_cloud_aws::AwsControlPlane;
use orgflow_config::Settings;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub async fn handle(
    file: Option<PathBuf>,
    project_dir: &Path,
    write_ids: bool,
) -> anyhow::Result<()> {
    let path = utils::resolve_tree_path(file)?;
    utils::print_tree_file(&path);

    let (mut organization, plan) = utils::load_plan(&path)?;
    println!("実行計画: {}", plan.summary().to_string().bold());

    if plan.is_empty() {
        println!("{}", "実行するステップがありません".yellow());
        return Ok(());
    }

    let settings = Settings::from_env()?;
    println!("リージョン: {}", settings.region.cyan());

    let state = Arc::new(StateManager::new(project_dir));
    let lock = state
        .acquire_lock()
        .await
        .context("状態ファイルのロックを取得できません")?;
    let prior = state.load().await?;

    let plane = AwsControlPlane::from_env(settings.region.clone()).await;
    let orchestrator = TreeOrchestrator::new(Arc::new(plane), settings.orchestrator_config())
        .with_checkpoint(state.clone());

    println!();
    println!("{}", "プロビジョニング中...".blue());
    let result = match orchestrator.run(&plan.steps, Some(prior)).await {
        Ok(result) => result,
        Err(e) => {
            lock.release().await?;
            return Err(e).context("プロビジョニングを実行できません");
        }
    };

    state.save(&result).await?;
    lock.release().await?;

    println!();
    utils::print_result(&result);

    if write_ids {
        let assigned = organization.assign_ids(&result);
        if assigned > 0 {
            let content = serde_yaml::to_string(&organization)?;
            std::fs::write(&path, content)
                .with_context(|| format!("書き込みに失敗しました: {}", path.display()))?;
            println!("{} {}個のIDを書き戻しました", "✓".green(), assigned);
        }
    }

    if !result.is_success() {
        std::process::exit(1);
    }

    println!();
    println!("{}", "✓ プロビジョニングが完了しました！".green().bold());
    Ok(())
}
