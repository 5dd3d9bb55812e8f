//! Subcommand implementations.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{info, warn};

use dossier_core::{
    create_delivery_client, read_identifiers_csv, CaseFileId, CaseProcessor, CaseState, Config,
    DeliveryClient, ErrorBudget, HttpTokenProvider, RunController, RunError, RunSummary, SignerLookup,
    SoapDocumentService, SqliteQueueStore, WorkQueueStore, Workspace,
};

use crate::progress::RunProgressBar;
use crate::Outcome;

/// `run`: process the pending queue.
pub async fn run(config: &Config) -> Result<Outcome> {
    let controller = build_controller(config)?;
    let bar = RunProgressBar::new();
    let controller = controller.with_progress(bar.callback());

    let result = controller.run().await;
    bar.finish();

    match result {
        Ok(summary) => {
            print_summary(&summary);
            Ok(if summary.is_clean() {
                Outcome::Success
            } else {
                Outcome::Partial
            })
        }
        Err(RunError::BudgetExceeded(summary)) => {
            print_summary(&summary);
            Err(anyhow!(
                "run aborted: more than {} document fetches failed",
                config.pipeline.max_errors
            ))
        }
        Err(e) => Err(e.into()),
    }
}

/// `load`: replace the queue with the identifiers of a CSV file.
pub fn load(config: &Config, csv: &Path, yes: bool) -> Result<Outcome> {
    if !csv.is_file() {
        bail!("CSV file not found: {}", csv.display());
    }
    let identifiers = read_identifiers_csv(csv)?;

    if !yes && !confirm("This replaces every queued case file with the ones in the CSV. Continue? [y/N] ")? {
        println!("Cancelled.");
        return Ok(Outcome::Success);
    }

    let store = open_store(config)?;
    let stored = store.load(&identifiers)?;
    if stored < identifiers.len() {
        warn!(
            read = identifiers.len(),
            stored,
            "Duplicate identifiers in CSV were ignored"
        );
    }
    println!("Loaded {} case files.", stored);
    Ok(Outcome::Success)
}

/// `fetch`: download and package one case file.
pub async fn fetch(config: &Config, case_file: &str) -> Result<Outcome> {
    let processor = build_processor(config)?;
    let budget = Arc::new(ErrorBudget::new(config.pipeline.max_errors));
    let report = processor.process(case_file, &budget).await;

    match (report.state, &report.archive) {
        (CaseState::CleanedUp, Some(archive)) => {
            println!("Packaged {} ({} documents, {} bytes).", archive.path.display(), archive.entries, archive.bytes);
            Ok(Outcome::Success)
        }
        (CaseState::Incomplete, _) => {
            println!(
                "{} is incomplete: {}.",
                report.case_file,
                report.cause.as_deref().unwrap_or("documents missing")
            );
            Ok(Outcome::Partial)
        }
        (state, _) => Err(anyhow!(
            "{} failed ({}): {}",
            report.case_file,
            state,
            report.cause.as_deref().unwrap_or("unknown cause")
        )),
    }
}

/// `send`: deliver an already packaged archive.
pub async fn send(config: &Config, case_file: &str) -> Result<Outcome> {
    let case_file = parse_case_file(case_file)?;
    let workspace = Workspace::new(&config.paths.downloads_dir, &case_file);
    let delivery = create_delivery_client(&config.delivery)?;

    let receipt = delivery
        .deliver(workspace.archive_path())
        .await
        .with_context(|| format!("Failed to deliver {}", case_file))?;
    info!(case_file = %case_file, remote_path = %receipt.remote_path, "Archive delivered");
    println!("Delivered {} ({} bytes).", receipt.remote_path, receipt.bytes);
    Ok(Outcome::Success)
}

/// `find`: whether the archive already exists remotely.
pub async fn find(config: &Config, case_file: &str) -> Result<Outcome> {
    let case_file = parse_case_file(case_file)?;
    let delivery = create_delivery_client(&config.delivery)?;

    if delivery.exists(&case_file.archive_name()).await? {
        println!("{} is present on the remote server.", case_file.archive_name());
        Ok(Outcome::Success)
    } else {
        println!("{} was not found on the remote server.", case_file.archive_name());
        Ok(Outcome::Partial)
    }
}

/// `pending`: number of case files still to process.
pub fn pending(config: &Config) -> Result<Outcome> {
    let store = open_store(config)?;
    println!("{} case files pending.", store.count_pending());
    Ok(Outcome::Success)
}

/// `check-server`: delivery endpoint reachability.
pub async fn check_server(config: &Config) -> Result<Outcome> {
    let delivery = create_delivery_client(&config.delivery)?;
    delivery
        .probe()
        .await
        .with_context(|| format!("{} endpoint is not reachable", delivery.name()))?;
    println!("The {} endpoint is reachable.", delivery.name());
    Ok(Outcome::Success)
}

fn build_controller(config: &Config) -> Result<RunController> {
    let store = open_store(config)?;
    let delivery: Arc<dyn DeliveryClient> = create_delivery_client(&config.delivery)?;
    let processor = build_processor(config)?;
    Ok(RunController::new(
        store,
        processor,
        delivery,
        config.pipeline.max_errors,
    ))
}

/// Fetch side only: no queue database and no delivery client.
fn build_processor(config: &Config) -> Result<CaseProcessor> {
    std::fs::create_dir_all(&config.paths.downloads_dir).with_context(|| {
        format!(
            "Failed to create downloads directory {:?}",
            config.paths.downloads_dir
        )
    })?;
    let tokens = HttpTokenProvider::new(&config.services).context("Failed to create token client")?;
    let documents = SoapDocumentService::new(&config.services, Arc::new(tokens))
        .context("Failed to create document service client")?;
    let signers = connect_signer(config)?;

    Ok(CaseProcessor::new(
        config.paths.downloads_dir.clone(),
        Arc::new(documents),
        signers,
        config.pipeline.max_concurrent_fetches,
    ))
}

fn open_store(config: &Config) -> Result<Arc<SqliteQueueStore>> {
    let path = &config.paths.database;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory {:?}", parent))?;
    }
    let store = SqliteQueueStore::new(path)
        .with_context(|| format!("Failed to open queue database {:?}", path))?;
    Ok(Arc::new(store))
}

#[cfg(feature = "oracle")]
fn connect_signer(config: &Config) -> Result<Arc<dyn SignerLookup>> {
    let lookup = dossier_core::OracleSignerLookup::connect(&config.signer)
        .with_context(|| format!("Failed to connect to {}", config.signer.connect_string()))?;
    Ok(Arc::new(lookup))
}

#[cfg(not(feature = "oracle"))]
fn connect_signer(_config: &Config) -> Result<Arc<dyn SignerLookup>> {
    bail!("this build has no signer database support; rebuild with the `oracle` feature")
}

/// Accepts a bare identifier or its archive name.
fn parse_case_file(raw: &str) -> Result<CaseFileId> {
    let raw = raw.trim();
    let raw = raw.strip_suffix(".zip").unwrap_or(raw);
    Ok(CaseFileId::parse(raw)?)
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes" | "s" | "si"
    )
}

fn print_summary(summary: &RunSummary) {
    println!("Run {}:", summary.run_id);
    println!("  pending at start: {}", summary.total);
    println!("  delivered:        {}", summary.completed);
    println!("  incomplete:       {}", summary.incomplete);
    println!("  rejected:         {}", summary.rejected);
    println!("  failed:           {}", summary.failed);
    println!("  document errors:  {}", summary.document_failures);
    if summary.aborted {
        println!("  aborted: error budget exceeded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_file_accepts_archive_name() {
        let id = parse_case_file("EX-2023-4616333- -GDEBA-TESTGDEBA.zip").unwrap();
        assert_eq!(id.as_str(), "EX-2023-4616333- -GDEBA-TESTGDEBA");
        assert!(parse_case_file("not-an-id").is_err());
    }

    #[cfg(feature = "oracle")]
    fn local_config(root: &Path) -> Config {
        let toml = format!(
            r#"
[paths]
downloads_dir = "{root}/downloads"
database = "{root}/db/queue.db"

[services]
token_url = "http://127.0.0.1:1/jwt"
token_user = "svc"
token_password = "pw"
listing_url = "http://127.0.0.1:1/expedientes"
content_url = "http://127.0.0.1:1/documentos"

[signer]
host = "127.0.0.1"
service = "GEDO"
user = "reader"
password = "secret"
pool_size = 0

[delivery]
backend = "local"

[delivery.local]
dir = "{root}/outbox"
"#,
            root = root.display()
        );
        dossier_core::load_config_from_str(&toml).unwrap()
    }

    #[cfg(feature = "oracle")]
    #[test]
    fn test_fetch_side_needs_no_queue_or_delivery() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = local_config(temp.path());

        let processor = build_processor(&config).unwrap();

        assert_eq!(
            processor.downloads_dir(),
            temp.path().join("downloads").as_path()
        );
        assert!(temp.path().join("downloads").is_dir());
        assert!(!temp.path().join("db").exists());
        assert!(!temp.path().join("outbox").exists());
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes("S"));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
    }
}
