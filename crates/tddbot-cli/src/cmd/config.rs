use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;
use tddbot_core::config::{ProjectStore, WarnLevel};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// List configured projects and their agents
    Show,

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(path: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    let store = ProjectStore::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    match subcmd {
        ConfigSubcommand::Show => show(&store, json),
        ConfigSubcommand::Validate => validate(&store, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(store: &ProjectStore, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(store);
    }
    if store.is_empty() {
        println!("No projects configured.");
        return Ok(());
    }

    let rows = store
        .projects()
        .iter()
        .flat_map(|p| {
            let channel = p.slack_channel_id.clone().unwrap_or_else(|| "-".into());
            if p.agents.is_empty() {
                return vec![vec![
                    p.linear_project_id.clone(),
                    p.project_name.clone(),
                    p.repo_path.display().to_string(),
                    channel,
                    "-".into(),
                    "-".into(),
                    "-".into(),
                ]];
            }
            p.agents
                .iter()
                .map(|a| {
                    vec![
                        p.linear_project_id.clone(),
                        p.project_name.clone(),
                        p.repo_path.display().to_string(),
                        channel.clone(),
                        a.mention.clone(),
                        a.role.clone(),
                        a.test_command.clone().unwrap_or_else(|| "-".into()),
                    ]
                })
                .collect()
        })
        .collect();
    print_table(
        &["PROJECT ID", "NAME", "REPO", "CHANNEL", "MENTION", "ROLE", "TESTS"],
        rows,
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(store: &ProjectStore, json: bool) -> anyhow::Result<()> {
    let warnings = store.validate();

    if json {
        let value = serde_json::json!({
            "projects": store.projects().len(),
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
