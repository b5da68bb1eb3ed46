//! Terminal front end: stdin REPL over a [`CrawlerConsole`].
//!
//! The view goes to stdout; prompts and notices go to stderr. Commands that
//! hit the management API run as their own tasks so the prompt stays live
//! while they are in flight.

use futures::StreamExt;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

use super::CrawlerConsole;
use super::render::{render_confirmation, render_pending, render_view};
use crate::crawler::{Bucket, CrawlerSpec, Notice, TaskType};

const HELP: &[(&str, &str)] = &[
    ("tab <all|error|running|stopped>", "switch tab and show it"),
    ("ls", "show the current tab"),
    ("start <id>", "start a crawler"),
    ("stop <id>", "stop a crawler (asks for confirmation)"),
    ("delete <id>", "delete a crawler (asks for confirmation)"),
    ("yes / no", "confirm or cancel the pending stop/delete"),
    ("create <name> [taskType] [limit]", "create a crawler"),
    ("update <id> <name> [taskType]", "update a crawler"),
    ("process <id>", "attach to a process"),
    ("close", "detach from the process"),
    ("help", "show this help"),
    ("quit", "exit"),
];

/// A parsed REPL command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Tab(Bucket),
    List,
    Start(i64),
    Stop(i64),
    Delete(i64),
    Yes,
    No,
    Create(CrawlerSpec),
    Update {
        crawler_id: i64,
        name: String,
        task_type: Option<TaskType>,
    },
    Process(i64),
    Close,
    Help,
    Quit,
}

fn parse_id(raw: &str) -> Result<i64, String> {
    raw.parse()
        .map_err(|_| format!("Expected a numeric id, got {raw:?}"))
}

fn usage(command: &str) -> Option<&'static str> {
    HELP.iter()
        .map(|(usage, _)| *usage)
        .find(|usage| usage.split_whitespace().next() == Some(command))
}

/// Parse one input line.
pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("Empty command".to_string());
    };
    let head = head.to_ascii_lowercase();
    let args: Vec<&str> = words.collect();

    let cmd = match (head.as_str(), args.as_slice()) {
        ("help" | "?", []) => ConsoleCommand::Help,
        ("quit" | "exit" | "/quit", []) => ConsoleCommand::Quit,
        ("ls" | "list", []) => ConsoleCommand::List,
        ("yes" | "y", []) => ConsoleCommand::Yes,
        ("no" | "n", []) => ConsoleCommand::No,
        ("close", []) => ConsoleCommand::Close,
        ("tab", [bucket]) => ConsoleCommand::Tab(bucket.parse()?),
        ("start", [id]) => ConsoleCommand::Start(parse_id(id)?),
        ("stop", [id]) => ConsoleCommand::Stop(parse_id(id)?),
        ("delete", [id]) => ConsoleCommand::Delete(parse_id(id)?),
        ("process", [id]) => ConsoleCommand::Process(parse_id(id)?),
        ("create", [name, rest @ ..]) if rest.len() <= 2 => {
            let mut spec = CrawlerSpec::new(*name);
            if let Some(task_type) = rest.first() {
                spec = spec.with_task_type(task_type.parse()?);
            }
            if let Some(limit) = rest.get(1) {
                let limit = limit
                    .parse::<i64>()
                    .map_err(|_| format!("Expected a numeric limit, got {limit:?}"))?;
                spec = spec.with_task_count_limit(limit);
            }
            ConsoleCommand::Create(spec)
        }
        ("update", [id, name, rest @ ..]) if rest.len() <= 1 => ConsoleCommand::Update {
            crawler_id: parse_id(id)?,
            name: name.to_string(),
            task_type: rest.first().map(|t| t.parse::<TaskType>()).transpose()?,
        },
        (other, _) => {
            return Err(match usage(other) {
                Some(usage) => format!("Usage: {usage}"),
                None => format!("Unknown command: {other}. Type 'help' for commands."),
            });
        }
    };
    Ok(cmd)
}

#[derive(Debug, PartialEq, Eq)]
enum Step {
    Continue,
    Quit,
}

/// Run the REPL until `quit` or EOF, then detach the console.
pub async fn run_repl(mut console: CrawlerConsole, mut notices: mpsc::UnboundedReceiver<Notice>) {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        eprint!("> ");
                        continue;
                    }
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break, // EOF
                Err(e) => {
                    tracing::error!("Error reading stdin: {}", e);
                    break;
                }
            }
        }
    });

    let input = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|line| (line, rx))
    });
    let mut input = Box::pin(input);

    if console.is_active() {
        print_view(&console);
    }
    eprint!("> ");

    loop {
        tokio::select! {
            line = input.next() => {
                let Some(line) = line else { break };
                let step = match parse_command(&line) {
                    Ok(cmd) => dispatch(&mut console, cmd),
                    Err(msg) => {
                        eprintln!("⚠️  {msg}");
                        Step::Continue
                    }
                };
                if step == Step::Quit {
                    break;
                }
                eprint!("> ");
            }
            Some(notice) = notices.recv() => {
                eprintln!("\n{notice}");
                eprint!("> ");
            }
        }
    }

    console.deactivate();
}

fn print_view(console: &CrawlerConsole) {
    if !console.is_active() {
        eprintln!("ℹ️  No process attached. Use 'process <id>'.");
        return;
    }
    println!(
        "\n{}",
        render_view(console.snapshot().as_deref(), console.selected_bucket())
    );
    if let Some(line) = render_pending(console.pending()) {
        eprintln!("⏳ {line}");
    }
    if let Ok(ctl) = console.controller()
        && let Some(pending) = ctl.pending_confirmation()
    {
        eprintln!("⚠️  {}", render_confirmation(&pending));
    }
}

fn dispatch(console: &mut CrawlerConsole, cmd: ConsoleCommand) -> Step {
    match cmd {
        ConsoleCommand::Quit => return Step::Quit,
        ConsoleCommand::Help => {
            for (usage, what) in HELP {
                eprintln!("  {usage:<36} {what}");
            }
        }
        ConsoleCommand::Process(id) => {
            console.activate(Some(id));
            eprintln!("ℹ️  Attached to process {id}");
        }
        ConsoleCommand::Close => {
            console.deactivate();
            eprintln!("ℹ️  Detached");
        }
        ConsoleCommand::Tab(bucket) => {
            console.select_bucket(bucket);
            print_view(console);
        }
        ConsoleCommand::List => print_view(console),
        cmd => run_command(console, cmd),
    }
    Step::Continue
}

/// Commands that go through the lifecycle controller.
fn run_command(console: &CrawlerConsole, cmd: ConsoleCommand) {
    let ctl = match console.controller() {
        Ok(ctl) => ctl,
        Err(e) => {
            eprintln!("⚠️  {e}. Use 'process <id>' first.");
            return;
        }
    };

    match cmd {
        ConsoleCommand::Start(id) => {
            tokio::spawn(async move {
                if let Err(e) = ctl.request_start(id).await {
                    debug!("Start of crawler {id} ended with: {e}");
                }
            });
        }
        ConsoleCommand::Stop(id) => report_parked(ctl.request_stop(id)),
        ConsoleCommand::Delete(id) => report_parked(ctl.request_delete(id)),
        ConsoleCommand::Yes => match ctl.pending_confirmation() {
            Some(pending) => {
                tokio::spawn(async move {
                    if let Err(e) = ctl.confirm(Some(pending.id)).await {
                        debug!(
                            crawler_id = pending.action.crawler_id(),
                            "Confirmed {} ended with: {e}",
                            pending.action.kind()
                        );
                    }
                });
            }
            None => eprintln!("ℹ️  Nothing to confirm"),
        },
        ConsoleCommand::No => match ctl.cancel() {
            Some(pending) => eprintln!("ℹ️  Cancelled: {}", pending.prompt()),
            None => eprintln!("ℹ️  Nothing to cancel"),
        },
        ConsoleCommand::Create(spec) => {
            tokio::spawn(async move {
                if let Err(e) = ctl.request_create_or_update(spec, None).await {
                    debug!("Create ended with: {e}");
                }
            });
        }
        ConsoleCommand::Update {
            crawler_id,
            name,
            task_type,
        } => {
            // Keep the crawler's current task type unless one was given.
            let task_type = task_type
                .or_else(|| {
                    console.snapshot().and_then(|s| {
                        s.buckets
                            .find(crawler_id)
                            .and_then(|c| c.task_type())
                            .and_then(|t| t.parse().ok())
                    })
                })
                .unwrap_or_default();
            let spec = CrawlerSpec::new(name).with_task_type(task_type);
            tokio::spawn(async move {
                if let Err(e) = ctl.request_create_or_update(spec, Some(crawler_id)).await {
                    debug!("Update of crawler {crawler_id} ended with: {e}");
                }
            });
        }
        other => debug!("Unhandled console command: {other:?}"),
    }
}

fn report_parked(requested: crate::error::Result<crate::crawler::PendingConfirmation>) {
    match requested {
        Ok(pending) => eprintln!("⚠️  {}", render_confirmation(&pending)),
        Err(e) => eprintln!("⚠️  {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_commands() {
        assert_eq!(parse_command("ls").unwrap(), ConsoleCommand::List);
        assert_eq!(parse_command("  QUIT ").unwrap(), ConsoleCommand::Quit);
        assert_eq!(parse_command("y").unwrap(), ConsoleCommand::Yes);
        assert_eq!(parse_command("start 12").unwrap(), ConsoleCommand::Start(12));
        assert_eq!(parse_command("delete 3").unwrap(), ConsoleCommand::Delete(3));
        assert_eq!(parse_command("tab error").unwrap(), ConsoleCommand::Tab(Bucket::Error));
        assert_eq!(parse_command("process 4").unwrap(), ConsoleCommand::Process(4));
    }

    #[test]
    fn parses_create_with_optional_fields() {
        assert_eq!(
            parse_command("create alpha").unwrap(),
            ConsoleCommand::Create(CrawlerSpec::new("alpha"))
        );
        assert_eq!(
            parse_command("create beta company 5").unwrap(),
            ConsoleCommand::Create(
                CrawlerSpec::new("beta")
                    .with_task_type(TaskType::Company)
                    .with_task_count_limit(5)
            )
        );
        assert!(parse_command("create beta everything").is_err());
        assert!(parse_command("create beta all ten").is_err());
    }

    #[test]
    fn parses_update() {
        assert_eq!(
            parse_command("update 7 renamed jobFilter").unwrap(),
            ConsoleCommand::Update {
                crawler_id: 7,
                name: "renamed".into(),
                task_type: Some(TaskType::JobFilter),
            }
        );
        assert_eq!(
            parse_command("update 7 renamed").unwrap(),
            ConsoleCommand::Update {
                crawler_id: 7,
                name: "renamed".into(),
                task_type: None,
            }
        );
    }

    #[test]
    fn reports_usage_and_unknown_commands() {
        assert_eq!(parse_command("start").unwrap_err(), "Usage: start <id>");
        assert!(parse_command("start abc").unwrap_err().contains("numeric id"));
        assert!(parse_command("tab paused").is_err());
        assert!(parse_command("launch 1").unwrap_err().starts_with("Unknown command"));
        assert!(parse_command("   ").is_err());
    }
}
