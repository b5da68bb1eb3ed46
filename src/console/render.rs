//! Plain-text rendering of the console view.

use crate::crawler::{Bucket, CrawlerInfo, PendingConfirmation, PendingFlags, Snapshot};

/// Render the title, tab strip and the selected bucket's crawlers.
pub fn render_view(snapshot: Option<&Snapshot>, selected: Bucket) -> String {
    let Some(snapshot) = snapshot else {
        return "Crawler process: (loading...)".to_string();
    };

    let mut out = format!(
        "Crawler process: {} [{}]\n",
        snapshot.process_name, snapshot.process_status
    );

    let tabs: Vec<String> = snapshot
        .buckets
        .counts()
        .iter()
        .map(|(bucket, count)| {
            if *bucket == selected {
                format!("*{} ({count})*", bucket.title())
            } else {
                format!("{} ({count})", bucket.title())
            }
        })
        .collect();
    out.push_str(&tabs.join("  "));
    out.push('\n');

    let crawlers = snapshot.buckets.get(selected);
    if crawlers.is_empty() {
        out.push_str("  Empty\n");
    }
    for crawler in crawlers {
        out.push_str("  ");
        out.push_str(&render_crawler(crawler));
        out.push('\n');
    }
    out
}

pub fn render_crawler(crawler: &CrawlerInfo) -> String {
    let name = if crawler.name.is_empty() {
        "-"
    } else {
        crawler.name.as_str()
    };
    let mut line = format!("#{:<5} {:<20} {}", crawler.id, name, crawler.status);
    if let Some(task_type) = crawler.task_type() {
        line.push_str(&format!("  task={task_type}"));
    }
    if crawler.report_auth {
        line.push_str("  (report auth failed)");
    }
    line
}

/// One-line summary of commands still in flight, if any.
pub fn render_pending(flags: PendingFlags) -> Option<String> {
    let busy: Vec<&str> = [
        (flags.start, "start"),
        (flags.stop, "stop"),
        (flags.delete, "delete"),
        (flags.save, "save"),
    ]
    .into_iter()
    .filter_map(|(on, name)| on.then_some(name))
    .collect();

    if busy.is_empty() {
        None
    } else {
        Some(format!("In progress: {}", busy.join(", ")))
    }
}

pub fn render_confirmation(pending: &PendingConfirmation) -> String {
    format!("{} Type 'yes' to confirm, 'no' to cancel", pending.prompt())
}
