use anyhow::Context;
use colored::Colorize;
use orgflow_cloud::{ParamValue, Plan, ProvisioningResult, StepRecord, StepStatus};
use orgflow_core::{ChainBuilder, Organization};
use std::path::{Path, PathBuf};

/// 組織ツリーファイルのパスを決定する
///
/// 明示指定がなければ orgflow-config の探索順に従う。
pub fn resolve_tree_path(file: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match file {
        Some(path) => Ok(path),
        None => Ok(orgflow_config::find_tree_file()?),
    }
}

/// 組織ツリーを読み込み、プランを生成する
pub fn load_plan(path: &Path) -> anyhow::Result<(Organization, Plan)> {
    let organization = orgflow_core::load_organization(path)?;
    let plan = ChainBuilder::new()
        .plan(&organization)
        .with_context(|| format!("プランを生成できません: {}", path.display()))?;
    Ok((organization, plan))
}

/// 読み込んだツリーファイルを表示
pub fn print_tree_file(path: &Path) {
    println!("📄 組織ツリー: {}", path.display().to_string().cyan());
}

/// パラメータ値の表示形式
pub fn format_param(value: &ParamValue) -> String {
    match value {
        ParamValue::Literal(v) => v.clone(),
        ParamValue::EntityId(step_id) => format!("<{}>", step_id),
    }
}

fn status_symbol(status: StepStatus) -> colored::ColoredString {
    match status {
        StepStatus::Complete => "✓".green(),
        StepStatus::Pending => "…".yellow(),
        StepStatus::Failed => "✗".red(),
        StepStatus::Skipped => "-".dimmed(),
    }
}

/// 1ステップ分の記録を表示
pub fn print_record(step_id: &str, record: &StepRecord) {
    let id = record
        .entity_id
        .as_deref()
        .map(|id| format!(" ({})", id))
        .unwrap_or_default();
    println!(
        "  {} {}{}",
        status_symbol(record.status),
        step_id.cyan(),
        id.dimmed()
    );
    if let Some(error) = &record.error {
        println!("      {}", error.to_string().red());
    }
}

/// プロビジョニング結果のサマリーを表示
pub fn print_result(result: &ProvisioningResult) {
    for (step_id, record) in result.ordered() {
        print_record(step_id, record);
    }

    let skipped = result.skipped();
    println!();
    println!(
        "完了: {}  スキップ: {}",
        result.completed().len().to_string().green(),
        skipped.len().to_string().yellow()
    );

    if let Some((step_id, record)) = result.first_failure() {
        eprintln!();
        eprintln!("{}", "✗ プロビジョニングに失敗しました".red().bold());
        eprintln!("  ステップ: {}", step_id);
        if let Some(error) = &record.error {
            eprintln!("  理由: {}", error);
            if error.is_resumable() {
                eprintln!("  再実行すると記録済みのジョブのポーリングを再開します");
            }
        }
        if !skipped.is_empty() {
            eprintln!("  スキップされたステップ: {}", skipped.join(", "));
        }
    }
}
