use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde_json::{Value, json};

const CRAWL_TIMEOUT: Duration = Duration::from_secs(180);
const INDEX_PAUSE: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(
    name = "sitebrief-client",
    about = "Command-line client for a running sitebrief service"
)]
struct Cli {
    /// Base URL of the sitebrief service.
    #[arg(long, default_value = "http://localhost:8000", global = true)]
    server: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl a page and print its summary and a markdown preview.
    Crawl {
        url: String,
        /// Number of markdown characters to print.
        #[arg(long, default_value_t = 50)]
        preview: usize,
    },
    /// Index a single document.
    Index {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        content: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        ad: Option<String>,
    },
    /// Run a hybrid search.
    Search {
        query: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
        #[arg(long, default_value_t = 1.0)]
        semantic_ratio: f32,
    },
    /// Delete every indexed document.
    Clear,
    /// Crawl and index a batch of sites, then crawl more and search with their summaries.
    ///
    /// URLs are shuffled before the batch is split into indexed and searched sites.
    Batch {
        /// File listing URLs, one per line or as a CSV column.
        #[arg(long)]
        file: PathBuf,
        /// CSV header naming the URL column; without it the first http field of each line is used.
        #[arg(long)]
        column: Option<String>,
        /// Seed for the shuffle, for reproducible batches.
        #[arg(long)]
        seed: Option<u64>,
        /// Keep file order instead of shuffling.
        #[arg(long)]
        no_shuffle: bool,
        #[arg(long, default_value_t = 5)]
        index_count: usize,
        #[arg(long, default_value_t = 2)]
        search_count: usize,
        /// Identifier given to the first indexed site; later sites count up from it.
        #[arg(long, default_value_t = 2000)]
        start_id: i64,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let client = SiteBriefClient::new(&cli.server)?;
    match cli.command {
        Command::Crawl { url, preview } => {
            let page = client.crawl(&url).await?;
            println!("--- SUMMARY ---");
            println!("{}", page.summary);
            println!("\n--- WEBSITE CONTENT (MARKDOWN) ---");
            println!("{}", preview_chars(&page.markdown, preview));
        }
        Command::Index {
            id,
            content,
            title,
            ad,
        } => {
            let response = client
                .post("index", &json!({ "id": id, "title": title, "content": content, "ad": ad }))
                .await?;
            println!("{response}");
        }
        Command::Search {
            query,
            top_k,
            semantic_ratio,
        } => {
            let hits = client.search(&query, top_k, semantic_ratio).await?;
            print_hits(&hits);
        }
        Command::Clear => {
            let response = client.post("documents/clear", &json!({})).await?;
            println!("{response}");
        }
        Command::Batch {
            file,
            column,
            seed,
            no_shuffle,
            index_count,
            search_count,
            start_id,
        } => {
            let contents = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let mut urls = match column.as_deref() {
                Some(name) => column_urls(&contents, name)?,
                None => extract_urls(&contents),
            };
            if !no_shuffle {
                let mut rng = seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
                rng.shuffle(&mut urls);
            }
            run_batch(&client, &urls, index_count, search_count, start_id).await;
        }
    }
    Ok(())
}

struct CrawledPage {
    summary: String,
    markdown: String,
}

struct SiteBriefClient {
    http: Client,
    base_url: String,
}

impl SiteBriefClient {
    fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent("sitebrief-client")
            .timeout(CRAWL_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            bail!("{status} {text}");
        }
        serde_json::from_str(&text).with_context(|| format!("invalid JSON from {url}"))
    }

    async fn crawl(&self, url: &str) -> Result<CrawledPage> {
        let body = self.post("crawl_markdown", &json!({ "url": url })).await?;
        let summary = body["summary"].as_str().unwrap_or_default().to_string();
        if summary.is_empty() {
            bail!("no summary returned for {url}");
        }
        Ok(CrawledPage {
            summary,
            markdown: body["markdown"].as_str().unwrap_or_default().to_string(),
        })
    }

    async fn search(&self, query: &str, top_k: usize, semantic_ratio: f32) -> Result<Vec<Value>> {
        let body = self
            .post(
                "search",
                &json!({ "query": query, "top_k": top_k, "semantic_ratio": semantic_ratio }),
            )
            .await?;
        match body {
            Value::Array(hits) => Ok(hits),
            other => bail!("unexpected search response: {other}"),
        }
    }
}

async fn run_batch(
    client: &SiteBriefClient,
    urls: &[String],
    index_count: usize,
    search_count: usize,
    start_id: i64,
) {
    if index_count + search_count > urls.len() {
        println!(
            "Not enough websites in file, using max available: {}",
            urls.len()
        );
    }
    let index_count = index_count.min(urls.len());
    let search_count = search_count.min(urls.len() - index_count);

    for (offset, url) in urls.iter().take(index_count).enumerate() {
        println!("\nCrawling and summarizing: {url}");
        let page = match client.crawl(url).await {
            Ok(page) => page,
            Err(err) => {
                println!("Failed to crawl {url}: {err:#}");
                continue;
            }
        };
        println!("Summary: {}...", preview_chars(&page.summary, 200));
        let id = start_id + offset as i64;
        match client
            .post("index", &json!({ "id": id, "title": url, "content": page.summary }))
            .await
        {
            Ok(response) => println!("Index response: {response}"),
            Err(err) => println!("Index failed for {url}: {err:#}"),
        }
        tokio::time::sleep(INDEX_PAUSE).await;
    }

    for url in urls.iter().skip(index_count).take(search_count) {
        println!("\nCrawling and searching for: {url}");
        let page = match client.crawl(url).await {
            Ok(page) => page,
            Err(err) => {
                println!("Failed to crawl {url}: {err:#}");
                continue;
            }
        };
        println!("Summary: {}...", preview_chars(&page.summary, 200));
        match client.search(&page.summary, 3, 1.0).await {
            Ok(hits) => {
                println!("Search results:");
                print_hits(&hits);
            }
            Err(err) => println!("Search failed: {err:#}"),
        }
    }
}

fn print_hits(hits: &[Value]) {
    for (rank, hit) in hits.iter().enumerate() {
        let content = hit["content"].as_str().unwrap_or_default();
        println!(
            "[{}] id={} | url={}\n    semanticScore: {}\n    content: {}...\n",
            rank + 1,
            hit["id"],
            hit["title"].as_str().unwrap_or("-"),
            hit["_semanticScore"],
            preview_chars(content, 80)
        );
    }
}

/// Take the first `http(s)` field from each line, skipping headers and blanks.
fn extract_urls(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter_map(|line| {
            split_fields(line)
                .find(|field| field.starts_with("http"))
                .map(str::to_string)
        })
        .collect()
}

/// Read the URLs in the column headed `name`, skipping rows where it is blank or not a link.
fn column_urls(contents: &str, name: &str) -> Result<Vec<String>> {
    let mut lines = contents.lines();
    let header = lines.next().unwrap_or_default();
    let Some(position) = split_fields(header).position(|field| field == name) else {
        bail!("column '{name}' not found in header: {header}");
    };
    Ok(lines
        .filter_map(|line| split_fields(line).nth(position))
        .filter(|field| field.starts_with("http"))
        .map(str::to_string)
        .collect())
}

fn split_fields(line: &str) -> impl Iterator<Item = &str> {
    line.split(',').map(|field| field.trim().trim_matches('"'))
}

fn preview_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_come_from_any_csv_column() {
        let csv = "name,独立站网址\nTea Co,https://tea.example\nNo site,\n\"Candles\",\"http://candles.example\"\n";
        assert_eq!(
            extract_urls(csv),
            vec!["https://tea.example", "http://candles.example"]
        );
    }

    #[test]
    fn named_column_selects_urls() {
        let csv = "shop,独立站网址,contact\nTea Co,https://tea.example,http://mail.example\nNo site,,http://other.example\n";
        assert_eq!(
            column_urls(csv, "独立站网址").expect("column"),
            vec!["https://tea.example"]
        );
        assert!(column_urls(csv, "missing").is_err());
    }

    #[test]
    fn seeded_shuffle_is_reproducible() {
        let urls: Vec<String> = (0..8).map(|n| format!("https://{n}.example")).collect();
        let mut first = urls.clone();
        let mut second = urls.clone();
        fastrand::Rng::with_seed(7).shuffle(&mut first);
        fastrand::Rng::with_seed(7).shuffle(&mut second);
        assert_eq!(first, second);
        first.sort();
        assert_eq!(first, urls);
    }

    #[test]
    fn preview_respects_char_boundaries() {
        assert_eq!(preview_chars("内容摘要很长", 4), "内容摘要");
        assert_eq!(preview_chars("short", 80), "short");
    }
}
