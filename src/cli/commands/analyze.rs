//! Analysis commands: run a document or XHR request and print the outcome.

use std::io::Read;
use std::path::Path;

use console::style;

use crate::analyze::{analyze_document, analyze_xhr, AnalyzeOutcome, AnalyzeRequest, DocumentRequest, XhrRequest};
use crate::scrapers::HttpClient;

/// Read a request file, or stdin when the path is `-`.
fn read_request(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    if !path.exists() {
        anyhow::bail!("Request file not found: {}", path.display());
    }
    Ok(std::fs::read_to_string(path)?)
}

fn print_outcome(outcome: &AnalyzeOutcome, compact: bool) -> anyhow::Result<()> {
    let marker = if outcome.has_data {
        style("✓").green()
    } else {
        style("✗").red()
    };
    eprintln!(
        "{} [{}] {}",
        marker,
        style(outcome.mode_used).cyan(),
        outcome.message
    );
    eprintln!(
        "  {} {} trace steps",
        style("→").dim(),
        outcome.decision_trace.len()
    );

    let json = if compact {
        serde_json::to_string(outcome)?
    } else {
        serde_json::to_string_pretty(outcome)?
    };
    println!("{}", json);
    Ok(())
}

pub async fn cmd_document(client: &HttpClient, path: &Path, compact: bool) -> anyhow::Result<()> {
    let request = DocumentRequest::from_json(&read_request(path)?)?;
    let outcome = analyze_document(client, &request).await?;
    print_outcome(&outcome, compact)
}

pub async fn cmd_xhr(client: &HttpClient, path: &Path, compact: bool) -> anyhow::Result<()> {
    let request = XhrRequest::from_json(&read_request(path)?)?;
    let outcome = analyze_xhr(client, &request).await?;
    print_outcome(&outcome, compact)
}
