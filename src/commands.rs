use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{Config, show_config};
use crate::embeddings::{Embedder, TogetherClient};
use crate::ingest::{DocumentIngestor, IngestReport};
use crate::search::{HybridQuery, HybridRanker, ScoredResult};
use crate::store::{SqliteVectorStore, VectorStore};

/// Options for the `search` command
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub query: String,
    pub limit: Option<usize>,
    pub keyword_only: bool,
    pub exclude_document: Option<String>,
    pub json: bool,
}

/// Open the vector database named by the configuration
#[inline]
pub async fn open_store(config: &Config) -> Result<SqliteVectorStore> {
    let db_path = config.database_path();
    SqliteVectorStore::open(&db_path, config.embedding.dimension)
        .await
        .with_context(|| format!("Failed to open vector database: {}", db_path.display()))
}

/// Write the configuration file (defaults if none exists), or print it
#[inline]
pub fn configure(config_dir: &Path, show: bool) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    if show {
        show_config(&config);
        return Ok(());
    }

    config.save().context("Failed to save configuration")?;
    println!(
        "{} {}",
        style("✓ Configuration written to").green(),
        style(config.config_file_path().display()).cyan()
    );
    println!(
        "Set {} to your API key before ingesting documents.",
        style(&config.embedding.api_key_env).bold()
    );
    Ok(())
}

/// Ingest a text file extracted from a PDF, one page per form feed
#[inline]
pub async fn ingest_file(
    config: &Config,
    path: &Path,
    name: Option<String>,
    document_id: Option<String>,
) -> Result<IngestReport> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let pdf_name = match name {
        Some(name) => name,
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("Input path has no file name, pass --name")?,
    };
    let store = Arc::new(open_store(config).await?);

    // A rerun resumes the stored document under its existing id
    let document_id = match document_id {
        Some(id) => id,
        None => store
            .documents()
            .await
            .context("Failed to look up stored documents")?
            .into_iter()
            .find(|doc| doc.pdf_name == pdf_name)
            .map_or_else(|| Uuid::new_v4().to_string(), |doc| doc.document_id),
    };

    let embedder = Arc::new(
        TogetherClient::new(&config.embedding).context("Failed to create embedding client")?,
    );

    info!("Ingesting {} as '{}'", path.display(), pdf_name);
    let report = DocumentIngestor::new(store, embedder)
        .ingest_text(&document_id, &pdf_name, &text)
        .await?;

    print_ingest_report(&report);
    ensure_complete(&report)?;
    Ok(report)
}

/// Fail when any page of the report could not be stored
fn ensure_complete(report: &IngestReport) -> Result<()> {
    if report.is_complete() {
        return Ok(());
    }

    let pages = report
        .failed_pages
        .iter()
        .map(|failed| failed.page_number.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    anyhow::bail!(
        "'{}' was only partly stored: page(s) {} failed. Run ingest again to retry them.",
        report.pdf_name,
        pages
    )
}

fn print_ingest_report(report: &IngestReport) {
    if report.already_present && report.pages_stored == 0 && report.is_complete() {
        println!(
            "{} '{}' is already stored. Delete it first to re-ingest.",
            style("⚠").yellow(),
            report.pdf_name
        );
        return;
    }

    println!(
        "{} Stored {} pages of '{}' (document {})",
        style("✓").green(),
        report.pages_stored,
        report.pdf_name,
        style(&report.document_id).dim()
    );
    if report.pages_skipped > 0 {
        println!("  Already stored: {}", report.pages_skipped);
    }
    if report.blank_pages > 0 {
        println!("  Blank pages skipped: {}", report.blank_pages);
    }
    for failed in &report.failed_pages {
        println!(
            "  {} Page {}: {}",
            style("✗").red(),
            failed.page_number,
            failed.error
        );
    }
}

/// List every stored document
#[inline]
pub async fn list_documents(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let documents = store
        .documents()
        .await
        .context("Failed to list documents")?;

    if documents.is_empty() {
        println!("No documents have been ingested yet.");
        println!("Use 'pdf-lens ingest <file>' to add one.");
        return Ok(());
    }

    println!("Documents ({} total):", documents.len());
    println!();

    for doc in &documents {
        println!("📄 {}", style(&doc.pdf_name).bold());
        println!("   ID: {}", style(&doc.document_id).dim());
        println!("   Pages: {}", doc.page_count);
        if doc.record_count != doc.page_count {
            println!("   Records: {}", doc.record_count);
        }
        println!("   Added: {}", doc.created_at.format("%Y-%m-%d %H:%M:%S"));
        println!();
    }

    let total_records: u64 = documents.iter().map(|d| d.record_count).sum();
    println!("Total records: {}", total_records);
    Ok(())
}

/// Delete every record of one document
#[inline]
pub async fn delete_document(config: &Config, pdf_name: &str) -> Result<u64> {
    let store = open_store(config).await?;
    let deleted = store
        .delete_by_document(pdf_name)
        .await
        .with_context(|| format!("Failed to delete '{}'", pdf_name))?;

    if deleted == 0 {
        println!("No document named '{}' was found.", pdf_name);
    } else {
        println!(
            "{} Deleted '{}' ({} records)",
            style("✓").green(),
            pdf_name,
            deleted
        );
    }
    Ok(deleted)
}

/// Remove everything and compact the database file
#[inline]
pub async fn clear_store(config: &Config) -> Result<u64> {
    let store = open_store(config).await?;
    let removed = store.clear().await.context("Failed to clear store")?;
    store
        .optimize()
        .await
        .context("Failed to optimize database")?;

    println!("{} Removed {} records", style("✓").green(), removed);
    Ok(removed)
}

/// Run a search and print the ranked passages
#[inline]
pub async fn search(config: &Config, options: &SearchOptions) -> Result<Vec<ScoredResult>> {
    let store = Arc::new(open_store(config).await?);
    let ranker = HybridRanker::new(store, config.ranking.clone());

    let mut query = HybridQuery::new(&options.query, ranker.config());
    if let Some(limit) = options.limit {
        query = query.with_limit(limit);
    }
    if let Some(document_id) = &options.exclude_document {
        query = query.excluding(document_id);
    }

    if options.keyword_only {
        info!("Running keyword-only search");
    } else {
        let client = TogetherClient::new(&config.embedding)
            .context("Failed to create embedding client (use --keyword-only to search without one)")?;
        let text = options.query.clone();
        let embedding = tokio::task::spawn_blocking(move || client.embed(&text))
            .await
            .context("Embedding task failed")?
            .context("Failed to embed query")?;
        query = query.with_embedding(embedding);
    }

    let results = ranker.search(&query).await.context("Search failed")?;

    if options.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&results).context("Failed to serialize results")?
        );
    } else {
        print_results(&options.query, &results);
    }
    Ok(results)
}

fn print_results(query: &str, results: &[ScoredResult]) {
    if results.is_empty() {
        warn!("No results for '{}'", query);
        println!("No relevant passages found for '{}'.", query);
        return;
    }

    println!("Results for '{}':", style(query).bold());
    println!();

    for (rank, result) in results.iter().enumerate() {
        println!(
            "{}. {} (page {}) score {}",
            rank + 1,
            style(&result.metadata.pdf_name).bold(),
            result.metadata.page_number,
            style(format!("{:.3}", result.final_score)).cyan()
        );

        let mut signals = Vec::new();
        if let Some(similarity) = result.similarity {
            signals.push(format!("semantic {:.3}", similarity));
        }
        if let Some(keyword) = result.keyword_score {
            signals.push(format!("keyword {:.3}", keyword));
        }
        if let Some(exact) = result.exact_match_score {
            signals.push(format!("exact {:.2}", exact));
        }
        println!("   {}", style(signals.join(", ")).dim());
        println!("   {}", excerpt(&result.metadata.text, 200));
        println!();
    }
}

/// First `max_chars` characters of `text` on a single line
fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}…", cut.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::FailedPage;

    fn report(failed_pages: Vec<FailedPage>) -> IngestReport {
        IngestReport {
            document_id: "doc-1".to_string(),
            pdf_name: "annual.pdf".to_string(),
            already_present: false,
            pages_stored: 3,
            pages_skipped: 0,
            blank_pages: 0,
            failed_pages,
        }
    }

    #[test]
    fn complete_ingest_is_ok() {
        assert!(ensure_complete(&report(Vec::new())).is_ok());
    }

    #[test]
    fn partial_ingest_is_an_error() {
        let err = ensure_complete(&report(vec![
            FailedPage {
                page_number: 2,
                error: "provider timed out".to_string(),
            },
            FailedPage {
                page_number: 7,
                error: "provider timed out".to_string(),
            },
        ]))
        .expect_err("failed pages should fail the command");

        let message = err.to_string();
        assert!(message.contains("annual.pdf"));
        assert!(message.contains("2, 7"));
    }

    #[test]
    fn excerpt_flattens_whitespace() {
        assert_eq!(excerpt("a\n\nb   c", 50), "a b c");
    }

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        let text = "é".repeat(10);
        assert_eq!(excerpt(&text, 4), "éééé…");
    }
}
