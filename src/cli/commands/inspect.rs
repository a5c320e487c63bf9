//! Page inspection commands: selector suggestions and surface relevance.

use console::style;

use crate::extract::{compute_relevance, passes_relevance, suggest_selectors, surface_text};
use crate::models::{QueryParams, StringMap};
use crate::scrapers::HttpClient;

async fn fetch_page(client: &HttpClient, url: &str) -> anyhow::Result<String> {
    let fetch = client
        .get(url, &StringMap::new(), &QueryParams::new(), &StringMap::new(), 0)
        .await?;
    if fetch.is_error() {
        anyhow::bail!("{} returned HTTP {}", url, fetch.status_code);
    }
    Ok(fetch.text())
}

pub async fn cmd_suggest(client: &HttpClient, url: &str, min_count: usize) -> anyhow::Result<()> {
    let html = fetch_page(client, url).await?;
    let suggestions = suggest_selectors(&html, min_count);

    if suggestions.is_empty() {
        eprintln!(
            "{} No class repeats at least {} times",
            style("!").yellow(),
            min_count
        );
    }
    for s in &suggestions {
        eprintln!("  {:<40} {}", style(&s.selector).cyan(), s.count);
    }

    println!("{}", serde_json::to_string_pretty(&suggestions)?);
    Ok(())
}

pub async fn cmd_surface(
    client: &HttpClient,
    url: &str,
    fields: &[String],
    max_table_rows: usize,
    min_score: f64,
) -> anyhow::Result<()> {
    let html = fetch_page(client, url).await?;
    let (text, used) = surface_text(&html, max_table_rows);
    let relevance = compute_relevance(fields, &text, used);
    let passes = passes_relevance(&relevance, min_score);

    let verdict = if passes {
        style("✓ relevant").green()
    } else {
        style("✗ not relevant").red()
    };
    eprintln!(
        "{} score {:.2} from {} ({} of {} fields)",
        verdict,
        relevance.score,
        used,
        relevance.matched_fields.len(),
        fields.len()
    );

    let report = serde_json::json!({
        "relevance": relevance,
        "passes": passes,
        "surface_text": text,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
