//! Search procurement notices from the terminal, with live per-region
//! progress when the event stream is reachable.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use licitaradar_core::{SearchId, Stage, UfCode};
use licitaradar_sdk::{
    CancelToken, FallbackView, SdkConfig, SearchClient, SearchProgressState, SearchRequest,
    SearchResponse, record_phrase, region_phrase,
};

#[derive(Parser, Debug)]
#[command(name = "licitaradar", about = "Search public procurement notices across regions")]
struct Cli {
    /// Search terms
    #[arg(required = true)]
    query: Vec<String>,

    /// Comma-separated region codes (default: all 27)
    #[arg(long, value_delimiter = ',')]
    ufs: Option<Vec<String>>,

    /// Refresh: skip recently cached results
    #[arg(long)]
    fresh: bool,

    /// API base URL
    #[arg(long, env = "LICITARADAR_API_URL", default_value = "http://localhost:8080")]
    base_url: String,

    /// Skip the live progress stream and wait for the final response
    #[arg(long)]
    no_stream: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let query = cli.query.join(" ");

    let requested: Vec<UfCode> = match &cli.ufs {
        None => UfCode::all(),
        Some(codes) => codes
            .iter()
            .map(|c| UfCode::parse(c))
            .collect::<Result<_, _>>()
            .map_err(|e| anyhow::anyhow!("{e}"))?,
    };

    let client = Arc::new(SearchClient::new(SdkConfig::new(cli.base_url.as_str()))?);
    let search_id = SearchId::new();

    let mut request = SearchRequest::new(query.as_str())
        .with_ufs(requested.iter().map(|u| u.as_str().to_string()).collect())
        .with_search_id(search_id);
    if cli.fresh {
        request = request.fresh();
    }

    eprintln!(
        "Searching {} for {}...",
        region_phrase(requested.len()),
        style_query(&query)
    );

    let cancel = CancelToken::new();
    let post_client = client.clone();
    let post = tokio::spawn(async move {
        post_client.search_with_cancel(request, &cancel).await
    });

    if !cli.no_stream {
        follow_progress(&client, search_id, requested.clone()).await;
    }

    match post.await? {
        Ok(response) => {
            print_results(&response, requested.len());
            Ok(())
        }
        Err(error) => {
            let view = FallbackView::for_failure(
                &error,
                client.config().manual_retry_cooldown,
                client.last_successful(),
            );
            eprintln!();
            eprintln!("{}", view.headline.red().bold());
            eprintln!("{}", view.body);
            eprintln!(
                "You can try again in {} seconds.",
                view.retry_cooldown_secs
            );
            if let Some(cached) = &view.last_successful {
                eprintln!(
                    "Meanwhile, your previous search is still available ({}).",
                    record_phrase(cached.total)
                );
            }
            std::process::exit(1);
        }
    }
}

/// Consume the event stream until the terminal marker, printing each
/// region as it resolves. Falls back silently to the synchronous
/// response when the stream is unreachable.
async fn follow_progress(client: &SearchClient, search_id: SearchId, requested: Vec<UfCode>) {
    let mut progress = SearchProgressState::new(requested);

    let mut stream = match client
        .subscribe_when_ready(search_id, 10, Duration::from_millis(200))
        .await
    {
        Ok(stream) => stream,
        Err(_) => {
            eprintln!("{}", "Live progress unavailable; waiting for results...".dimmed());
            return;
        }
    };

    let mut offered_partial = false;
    while let Some(event) = stream.next_event().await {
        let Ok(event) = event else { break };
        progress.apply(&event);

        if let licitaradar_core::StreamEvent::UfStatus { uf, status, count, .. } = &event {
            if status.is_terminal() {
                eprintln!("  {}", region_line(uf, *status, *count));
            }
        }

        if !offered_partial && progress.should_offer_partial(progress.elapsed()) {
            eprintln!(
                "{}",
                format!(
                    "Partial results are ready: {}. Still waiting on {}.",
                    record_phrase(progress.total_found()),
                    region_phrase(progress.pending_count())
                )
                .yellow()
            );
            offered_partial = true;
            progress.dismiss_partial_prompt();
        }

        if event.is_complete() {
            break;
        }
    }
}

fn region_line(uf: &UfCode, stage: Stage, count: Option<u64>) -> String {
    let code = console::pad_str(uf.as_str(), 3, console::Alignment::Left, None).to_string();
    match stage {
        Stage::Success => format!("{} {}", code.green(), record_phrase(count.unwrap_or(0))),
        Stage::Recovered => format!(
            "{} {} (after a hiccup)",
            code.green(),
            record_phrase(count.unwrap_or(0))
        ),
        Stage::Failed => format!("{} {}", code.red(), "no answer".dimmed()),
        _ => format!("{} ...", code),
    }
}

fn print_results(response: &SearchResponse, requested: usize) {
    println!();
    println!(
        "{} across {} (of {} requested){}",
        record_phrase(response.total).bold(),
        region_phrase(response.results.regions.len()),
        requested,
        if response.from_cache { " (recent results)" } else { "" }
    );

    for (uf, region) in &response.results.regions {
        if region.notices.is_empty() {
            continue;
        }
        println!();
        println!("{}", uf.as_str().bold().underline());
        for notice in region.notices.iter().take(5) {
            println!(
                "  {} | {} ({})",
                notice.title,
                notice.organ.dimmed(),
                notice.published_at.format("%Y-%m-%d")
            );
            println!("    {}", notice.url.blue());
        }
        if region.notices.len() > 5 {
            println!("  ... and {} more", region.notices.len() - 5);
        }
    }

    if !response.failed.is_empty() {
        println!();
        println!(
            "{}",
            format!(
                "{} didn't answer this time; results may be incomplete.",
                region_phrase(response.failed.len())
            )
            .yellow()
        );
    }
}

fn style_query(query: &str) -> String {
    format!("\"{}\"", query).cyan().to_string()
}
