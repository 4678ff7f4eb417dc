use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::info;

use ddg_search_client::{
    criteria::{CriteriaField, PageBoundsPolicy, SearchForm},
    presenter::{self, FilterColumn, ResultFilter, View},
    session::{self, Session},
    ClientConfig, Orchestrator, ResponseFencing, SearchClient,
};

#[derive(Parser, Debug)]
#[command(
    name = "ddg-search",
    version,
    about = "Search DuckDuckGo through the scraper API from the terminal"
)]
struct Cli {
    /// Words for `normal_query`
    query: Vec<String>,

    /// Set any search field, e.g. --set site_include=reddit.com
    #[arg(long = "set", value_name = "FIELD=VALUE")]
    sets: Vec<String>,

    #[arg(long)]
    max_pages: Option<i64>,

    /// Filter displayed rows, e.g. --filter title=rust
    #[arg(long = "filter", value_name = "COLUMN=TEXT")]
    filters: Vec<String>,

    /// Start an interactive session (default when no criteria are given)
    #[arg(short, long)]
    interactive: bool,

    /// Overrides SEARCH_API_URL
    #[arg(long)]
    api_url: Option<String>,

    /// Overrides SEARCH_TIMEOUT_SECS
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// advisory, clamp or reject (overrides SEARCH_PAGE_POLICY)
    #[arg(long)]
    page_policy: Option<PageBoundsPolicy>,

    /// last-write-wins or latest-only (overrides SEARCH_FENCING)
    #[arg(long)]
    fencing: Option<ResponseFencing>,
}

impl Cli {
    fn config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = ClientConfig::from_env()?;
        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Some(Duration::from_secs(secs));
        }
        if let Some(policy) = self.page_policy {
            config.page_policy = policy;
        }
        if let Some(fencing) = self.fencing {
            config.fencing = fencing;
        }
        Ok(config)
    }

    fn has_criteria(&self) -> bool {
        !self.query.is_empty() || !self.sets.is_empty() || self.max_pages.is_some()
    }

    fn form(&self, policy: PageBoundsPolicy) -> anyhow::Result<SearchForm> {
        let mut form = SearchForm::new(policy);
        if !self.query.is_empty() {
            form.update(CriteriaField::NormalQuery, &self.query.join(" "))?;
        }
        for assignment in &self.sets {
            let (name, value) = split_assignment(assignment)?;
            let field = name.parse::<CriteriaField>()?;
            form.update(field, value)?;
        }
        if let Some(pages) = self.max_pages {
            form.update(CriteriaField::MaxPages, &pages.to_string())?;
        }
        Ok(form)
    }

    fn filter(&self) -> anyhow::Result<ResultFilter> {
        let mut filter = ResultFilter::default();
        for assignment in &self.filters {
            let (name, value) = split_assignment(assignment)?;
            let column = name.parse::<FilterColumn>().map_err(anyhow::Error::msg)?;
            filter.set(column, value);
        }
        Ok(filter)
    }
}

fn split_assignment(assignment: &str) -> anyhow::Result<(&str, &str)> {
    assignment
        .split_once('=')
        .map(|(name, value)| (name.trim(), value))
        .ok_or_else(|| anyhow::anyhow!("expected NAME=VALUE, got '{}'", assignment))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr; stdout carries the rendered views
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config()?;
    info!("Search API URL: {}", config.api_url);

    let client = SearchClient::from_config(&config)?;
    let form = cli.form(config.page_policy)?;

    if cli.interactive || !cli.has_criteria() {
        let lines = session::spawn_stdin_reader();
        let mut repl = Session::new(form, client, config.fencing);
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(b"Type 'help' for commands, 'quit' to leave.\n")
            .await?;
        repl.run(lines, &mut stdout).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let filter = cli.filter()?;
    let mut submitted = None;
    form.submit(|criteria| submitted = Some(criteria))?;
    let Some(criteria) = submitted else {
        return Ok(ExitCode::FAILURE);
    };
    let mut orchestrator = Orchestrator::new(client, config.fencing);
    let state = orchestrator.submit(criteria).await;
    let view = presenter::present_filtered(state, &filter);

    let mut stdout = tokio::io::stdout();
    let text = presenter::render(&view);
    if text.is_empty() {
        info!("No results found");
    }
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;

    Ok(match view {
        View::Error(_) => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}
