//! Line-oriented terminal session standing in for the search page.

use crate::client::{SearchBackend, SearchError};
use crate::criteria::{CriteriaField, SearchForm};
use crate::presenter::{self, FilterColumn, ResultFilter, View};
use crate::state::{Orchestrator, RequestTicket, ResponseFencing};
use crate::types::{SearchCriteria, SearchResponse};
use anyhow::Result;
use chrono::NaiveDate;
use std::str::FromStr;
use std::io::BufRead;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

pub const HELP: &str = "\
Commands:
  set <field> <value>        set one search field
  unset <field>              clear one search field
  reset                      restore every field to its default
  show                       print the current search fields
  submit | search            run the search
  filter <title|date|url> <text>
  clear-filters
  health                     check the search service
  help
  quit | exit
Fields: normal_query exact_phrase semantic_query include_terms exclude_terms
        filetype site_include site_exclude intitle inurl start_date end_date max_pages
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set(CriteriaField, String),
    Unset(CriteriaField),
    Reset,
    Show,
    Submit,
    Filter(FilterColumn, String),
    ClearFilters,
    Health,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let field = |name: &str| name.parse::<CriteriaField>().map_err(|e| e.to_string());

        match verb {
            "set" => {
                let (name, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                if name.is_empty() {
                    return Err("usage: set <field> <value>".to_string());
                }
                Ok(Command::Set(field(name)?, value.trim().to_string()))
            }
            "unset" => Ok(Command::Unset(field(rest)?)),
            "reset" => Ok(Command::Reset),
            "show" => Ok(Command::Show),
            "submit" | "search" => Ok(Command::Submit),
            "filter" => {
                let (column, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                Ok(Command::Filter(column.parse::<FilterColumn>()?, text.trim().to_string()))
            }
            "clear-filters" => Ok(Command::ClearFilters),
            "health" => Ok(Command::Health),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command '{}', try 'help'", other)),
        }
    }
}

/// Date inputs accept `YYYY-MM-DD` or nothing. chrono also takes unpadded
/// months and days, so the value must survive a format round trip.
pub fn check_date_input(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Ok(());
    }
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) if date.format("%Y-%m-%d").to_string() == value => Ok(()),
        _ => Err(format!("'{}' is not a YYYY-MM-DD date", value)),
    }
}

/// Feed stdin lines to a session from a plain thread. A blocking read
/// cannot be cancelled, so it must not live on the runtime.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

type Completion = (RequestTicket, Result<SearchResponse, SearchError>);

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct Session<B> {
    form: SearchForm,
    orchestrator: Orchestrator<B>,
    filter: ResultFilter,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl<B> Session<B>
where
    B: SearchBackend + Clone + 'static,
{
    pub fn new(form: SearchForm, backend: B, fencing: ResponseFencing) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            form,
            orchestrator: Orchestrator::new(backend, fencing),
            filter: ResultFilter::default(),
            completions_tx,
            completions_rx,
        }
    }

    pub fn form(&self) -> &SearchForm {
        &self.form
    }

    pub fn orchestrator(&self) -> &Orchestrator<B> {
        &self.orchestrator
    }

    pub fn view(&self) -> View {
        presenter::present_filtered(self.orchestrator.state(), &self.filter)
    }

    /// Read commands until `quit` or end of input. Searches run in the
    /// background so commands keep being accepted while one is pending.
    pub async fn run<W>(&mut self, mut lines: mpsc::Receiver<String>, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        loop {
            tokio::select! {
                line = lines.recv() => {
                    let Some(line) = line else { break };
                    if self.handle_line(&line, out).await? == Flow::Quit {
                        return Ok(());
                    }
                }
                Some((ticket, outcome)) = self.completions_rx.recv() => {
                    self.finish(ticket, outcome, out).await?;
                }
            }
        }

        // Input ended; let the pending search land before leaving
        while self.orchestrator.state().is_loading() {
            match self.completions_rx.recv().await {
                Some((ticket, outcome)) => self.finish(ticket, outcome, out).await?,
                None => break,
            }
        }
        Ok(())
    }

    async fn finish<W>(
        &mut self,
        ticket: RequestTicket,
        outcome: Result<SearchResponse, SearchError>,
        out: &mut W,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        if self.orchestrator.complete(ticket, outcome) {
            self.print_view(out).await?;
        }
        Ok(())
    }

    async fn print_view<W>(&self, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let text = presenter::render(&self.view());
        if !text.is_empty() {
            out.write_all(text.as_bytes()).await?;
            out.flush().await?;
        }
        Ok(())
    }

    async fn handle_line<W>(&mut self, line: &str, out: &mut W) -> Result<Flow>
    where
        W: AsyncWrite + Unpin,
    {
        if line.trim().is_empty() {
            return Ok(Flow::Continue);
        }
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(message) => {
                say(out, &message).await?;
                return Ok(Flow::Continue);
            }
        };
        debug!("session command: {:?}", command);

        match command {
            Command::Set(field, value) => {
                if field.is_date() {
                    if let Err(message) = check_date_input(&value) {
                        say(out, &message).await?;
                        return Ok(Flow::Continue);
                    }
                }
                if let Err(e) = self.form.update(field, &value) {
                    say(out, &e.to_string()).await?;
                }
            }
            Command::Unset(field) => {
                let default = field.value_of(&SearchCriteria::default());
                if let Err(e) = self.form.update(field, &default) {
                    say(out, &e.to_string()).await?;
                }
            }
            Command::Reset => {
                self.form.reset();
                say(out, "Form cleared").await?;
            }
            Command::Show => {
                let mut text = String::new();
                for field in CriteriaField::ALL {
                    text.push_str(&format!(
                        "{:<15} {}\n",
                        field.key(),
                        field.value_of(self.form.criteria())
                    ));
                }
                out.write_all(text.as_bytes()).await?;
            }
            Command::Submit => self.submit(out).await?,
            Command::Filter(column, text) => {
                self.filter.set(column, &text);
                self.print_view(out).await?;
            }
            Command::ClearFilters => {
                self.filter = ResultFilter::default();
                self.print_view(out).await?;
            }
            Command::Health => {
                let message = match self.orchestrator.backend().health().await {
                    Ok(health) => format!("{}: {}", health.status, health.message),
                    Err(e) => format!("Search service unavailable: {}", e.message()),
                };
                say(out, &message).await?;
            }
            Command::Help => out.write_all(HELP.as_bytes()).await?,
            Command::Quit => return Ok(Flow::Quit),
        }
        out.flush().await?;
        Ok(Flow::Continue)
    }

    async fn submit<W>(&mut self, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        // The search button is disabled while a request is in flight
        if self.orchestrator.state().is_loading() {
            return say(out, "A search is already running").await;
        }
        let mut snapshot = None;
        if let Err(e) = self.form.submit(|criteria| snapshot = Some(criteria)) {
            return say(out, &e.to_string()).await;
        }
        let Some(criteria) = snapshot else {
            return Ok(());
        };

        let ticket = self.orchestrator.begin(&criteria);
        self.print_view(out).await?;

        let backend = self.orchestrator.backend().clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let outcome = backend.search(&criteria).await;
            let _ = tx.send((ticket, outcome));
        });
        Ok(())
    }
}

async fn say<W>(out: &mut W, message: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    out.write_all(message.as_bytes()).await?;
    out.write_all(b"\n").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::PageBoundsPolicy;
    use crate::state::tests::{cats_response, ScriptedBackend};
    use crate::state::Phase;

    fn session(backend: ScriptedBackend, policy: PageBoundsPolicy) -> Session<ScriptedBackend> {
        Session::new(SearchForm::new(policy), backend, ResponseFencing::default())
    }

    async fn run_script(session: &mut Session<ScriptedBackend>, script: &str) -> String {
        let (tx, rx) = mpsc::channel(64);
        for line in script.lines() {
            tx.send(line.to_string()).await.unwrap();
        }
        drop(tx);

        let mut out: Vec<u8> = Vec::new();
        session.run(rx, &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            "set normal_query rust programming".parse::<Command>(),
            Ok(Command::Set(
                CriteriaField::NormalQuery,
                "rust programming".to_string()
            ))
        );
        assert_eq!(
            "unset max_pages".parse::<Command>(),
            Ok(Command::Unset(CriteriaField::MaxPages))
        );
        assert_eq!(
            "filter title rust".parse::<Command>(),
            Ok(Command::Filter(FilterColumn::Title, "rust".to_string()))
        );
        assert_eq!("search".parse::<Command>(), Ok(Command::Submit));
        assert!("set colour blue".parse::<Command>().is_err());
        assert!("set".parse::<Command>().is_err());
        assert!("dance".parse::<Command>().is_err());
    }

    #[test]
    fn test_date_input_shape() {
        assert!(check_date_input("").is_ok());
        assert!(check_date_input("2025-01-02").is_ok());
        assert!(check_date_input("2025-13-01").is_err());
        assert!(check_date_input("02/01/2025").is_err());
        assert!(check_date_input("2025-1-2").is_err());
        assert!(check_date_input("2025-01-2").is_err());
    }

    #[tokio::test]
    async fn test_script_submits_and_renders() {
        let backend = ScriptedBackend::default();
        backend.push(Ok(cats_response()));
        let mut session = session(backend.clone(), PageBoundsPolicy::Advisory);

        let output = run_script(&mut session, "set normal_query cats\nsubmit\n").await;
        assert!(output.contains("Searching DuckDuckGo..."));
        assert!(output.contains("1. **A**"));
        assert!(output.contains("a.com"));
        assert_eq!(session.orchestrator().state().phase(), Phase::Success);

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].normal_query, "cats");
        assert_eq!(seen[0].max_pages, 20);
    }

    #[tokio::test]
    async fn test_script_reports_error() {
        let backend = ScriptedBackend::default();
        backend.push(Err(SearchError::with_detail("upstream timeout")));
        let mut session = session(backend, PageBoundsPolicy::Advisory);

        let output = run_script(&mut session, "submit\n").await;
        assert!(output.contains("Search Error\nupstream timeout"));
    }

    #[tokio::test]
    async fn test_bad_input_leaves_form_untouched() {
        let backend = ScriptedBackend::default();
        let mut session = session(backend, PageBoundsPolicy::Advisory);

        let output = run_script(
            &mut session,
            "set max_pages many\nset start_date tomorrow\nset end_date 2025-02-01\n",
        )
        .await;
        assert!(output.contains("max_pages must be a whole number"));
        assert!(output.contains("not a YYYY-MM-DD date"));
        let criteria = session.form().criteria();
        assert_eq!(criteria.max_pages, 20);
        assert_eq!(criteria.start_date, "");
        assert_eq!(criteria.end_date, "2025-02-01");
    }

    #[tokio::test]
    async fn test_reject_policy_blocks_submission() {
        let backend = ScriptedBackend::default();
        let mut session = session(backend.clone(), PageBoundsPolicy::Reject);

        let output = run_script(&mut session, "set max_pages 0\nsubmit\n").await;
        assert!(output.contains("max_pages must be between 1 and 100"));
        assert!(backend.seen.lock().unwrap().is_empty());
        assert_eq!(session.orchestrator().state().phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_health_reports_plain_message() {
        let backend = ScriptedBackend {
            unhealthy: true,
            ..Default::default()
        };
        let mut down = session(backend, PageBoundsPolicy::Advisory);
        let output = run_script(&mut down, "health\n").await;
        assert_eq!(
            output,
            "Search service unavailable: Search failed. Please try again.\n"
        );

        let mut up = session(ScriptedBackend::default(), PageBoundsPolicy::Advisory);
        let output = run_script(&mut up, "health\n").await;
        assert_eq!(output, "healthy: scripted\n");
    }

    #[tokio::test]
    async fn test_reset_and_quit() {
        let backend = ScriptedBackend::default();
        let mut session = session(backend.clone(), PageBoundsPolicy::Advisory);

        let output = run_script(
            &mut session,
            "set intitle cats\nset max_pages 50\nreset\nquit\nsubmit\n",
        )
        .await;
        assert!(output.contains("Form cleared"));
        assert_eq!(session.form().criteria(), &SearchCriteria::default());
        // Nothing after quit runs
        assert!(backend.seen.lock().unwrap().is_empty());
    }
}
