//! Subcommand handlers.

use anyhow::Result;
use orlova_core::{
    CancellationToken, DestinationKind, DiffusionQuery, DownloadJob, DownloadOutcome,
    DownloadProgress, OrlovaApi, RankPreferences, SearchQuery,
};
use serde::Serialize;
use std::process::ExitCode;
use tracing::info;

pub struct Output {
    pub json: bool,
}

impl Output {
    fn json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

pub async fn search(api: &OrlovaApi, out: &Output, query: SearchQuery) -> Result<()> {
    let results = api.search_models(&query).await?;
    if out.json {
        return out.json(&results);
    }

    for model in &results.models {
        let quants: Vec<&str> = model.quantizations.iter().map(|q| q.label.as_str()).collect();
        println!(
            "{}  {} downloads  {} likes  updated {}  [{}]",
            model.id,
            model.downloads,
            model.likes,
            model.last_modified.format("%Y-%m-%d"),
            quants.join(", ")
        );
    }
    println!("{} models", results.total);
    Ok(())
}

pub async fn rank(
    api: &OrlovaApi,
    out: &Output,
    query: SearchQuery,
    preferences: RankPreferences,
) -> Result<()> {
    api.search_models(&query).await?;
    let outcome = api.rank_models(&preferences).await;
    if out.json {
        return out.json(&outcome);
    }

    if let Some(message) = &outcome.message {
        println!("{}", message);
    }
    for (i, model) in outcome.ranked.iter().enumerate() {
        println!(
            "{:>2}. {:.3}  {}  {}  {}",
            i + 1,
            model.score,
            model.model_id,
            model.best_quant,
            model.pull_reference().unwrap_or_default()
        );
    }
    Ok(())
}

pub async fn diffusion(api: &OrlovaApi, out: &Output, query: DiffusionQuery) -> Result<()> {
    let results = api.search_diffusion(&query).await?;
    if out.json {
        return out.json(&results);
    }

    for model in &results.models {
        println!(
            "{}  ({})  {} downloads  {} files",
            model.id,
            model.model_type,
            model.downloads,
            model.files.len()
        );
        for file in &model.files {
            println!("    {}", file.filename);
        }
    }
    println!("{} models", results.total);
    Ok(())
}

pub async fn download(
    api: &OrlovaApi,
    out: &Output,
    repo: String,
    filename: String,
    kind: DestinationKind,
) -> Result<ExitCode> {
    let mut job = DownloadJob::new(repo, filename, kind);
    cancel_on_ctrl_c(job.cancel_handle());

    let outcome = api.download_asset(&mut job, print_progress).await?;
    finish(out, &outcome)
}

pub async fn pull(
    api: &OrlovaApi,
    out: &Output,
    repo: &str,
    quant: &str,
    size: Option<u64>,
) -> Result<ExitCode> {
    let token = CancellationToken::new();
    cancel_on_ctrl_c(token.clone());

    let outcome = api
        .pull_model(repo, quant, size, &token, print_progress)
        .await?;
    finish(out, &outcome)
}

pub fn disk(api: &OrlovaApi, out: &Output) -> Result<()> {
    let report = api.disk_report();
    if out.json {
        return out.json(&report);
    }

    for disk in &report.disks {
        println!(
            "{}  {} free of {}  ({}% used)",
            disk.path.display(),
            disk.free_human,
            disk.total_human,
            disk.used_percent
        );
    }
    println!(
        "Model store: {} ({} free)",
        report.current_models_path.display(),
        report
            .current_models_path_free
            .as_deref()
            .unwrap_or("unknown")
    );
    Ok(())
}

pub fn space(api: &OrlovaApi, out: &Output, size: u64) -> Result<()> {
    let check = api.check_space(size);
    if out.json {
        return out.json(&check);
    }
    println!("{}", check.message);
    Ok(())
}

fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling");
            token.cancel();
        }
    });
}

fn print_progress(progress: DownloadProgress) {
    match progress.percent {
        Some(percent) => eprintln!("[{:>3}%] {}", percent, progress.status),
        None => eprintln!("{}", progress.status),
    }
}

/// Print the outcome. A rejected or cancelled transfer exits non-zero.
fn finish(out: &Output, outcome: &DownloadOutcome) -> Result<ExitCode> {
    if out.json {
        out.json(outcome)?;
    } else {
        println!("{}", outcome.message);
    }
    Ok(exit_code(outcome))
}

fn exit_code(outcome: &DownloadOutcome) -> ExitCode {
    if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn same(a: ExitCode, b: ExitCode) -> bool {
        format!("{:?}", a) == format!("{:?}", b)
    }

    #[test]
    fn test_unsuccessful_outcome_exits_non_zero() {
        let cancelled = DownloadOutcome::rejected("Download cancelled");
        assert!(same(exit_code(&cancelled), ExitCode::FAILURE));

        let done = DownloadOutcome::completed(PathBuf::from("/m/vae/x.safetensors"), "Downloaded");
        assert!(same(exit_code(&done), ExitCode::SUCCESS));
    }
}
