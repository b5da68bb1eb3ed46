//! Bucket classification: maps a crawler list onto the four console tabs.

use serde::{Deserialize, Serialize};

use super::model::CrawlerInfo;

/// One of the four console tabs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    #[default]
    All,
    /// Idle crawlers that failed to authenticate/report.
    Error,
    Running,
    /// Idle crawlers with no reported problem.
    Stopped,
}

impl Bucket {
    /// Tab order as displayed.
    pub const ORDER: [Bucket; 4] = [Bucket::All, Bucket::Error, Bucket::Running, Bucket::Stopped];

    /// Human-readable tab title.
    pub fn title(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Error => "Abnormally stopped",
            Self::Running => "Running",
            Self::Stopped => "Not running",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Error => write!(f, "error"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

impl std::str::FromStr for Bucket {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "error" => Ok(Self::Error),
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            _ => Err(format!("Unknown bucket: {}", s)),
        }
    }
}

/// Crawlers grouped by bucket. `error`, `running` and `stopped` partition
/// `all`; each keeps the relative order of the source list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucketSet {
    all: Vec<CrawlerInfo>,
    error: Vec<CrawlerInfo>,
    running: Vec<CrawlerInfo>,
    stopped: Vec<CrawlerInfo>,
}

impl BucketSet {
    pub fn get(&self, bucket: Bucket) -> &[CrawlerInfo] {
        match bucket {
            Bucket::All => &self.all,
            Bucket::Error => &self.error,
            Bucket::Running => &self.running,
            Bucket::Stopped => &self.stopped,
        }
    }

    pub fn count(&self, bucket: Bucket) -> usize {
        self.get(bucket).len()
    }

    /// `(bucket, count)` pairs in tab order.
    pub fn counts(&self) -> [(Bucket, usize); 4] {
        Bucket::ORDER.map(|b| (b, self.count(b)))
    }

    /// Look up a crawler by id across the whole set.
    pub fn find(&self, crawler_id: i64) -> Option<&CrawlerInfo> {
        self.all.iter().find(|c| c.id == crawler_id)
    }
}

/// The three buckets a single crawler can land in. `All` is never one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Partition {
    Error,
    Running,
    Stopped,
}

impl Partition {
    fn of(crawler: &CrawlerInfo) -> Self {
        match (crawler.status.is_idle(), crawler.report_auth) {
            (true, true) => Self::Error,
            (true, false) => Self::Stopped,
            (false, _) => Self::Running,
        }
    }
}

impl From<Partition> for Bucket {
    fn from(p: Partition) -> Self {
        match p {
            Partition::Error => Bucket::Error,
            Partition::Running => Bucket::Running,
            Partition::Stopped => Bucket::Stopped,
        }
    }
}

/// Which of the three partition buckets a crawler falls into.
///
/// Only `status` and `report_auth` are consulted. A running-like crawler is
/// `Running` even when `report_auth` is set.
pub fn bucket_of(crawler: &CrawlerInfo) -> Bucket {
    Partition::of(crawler).into()
}

/// Classify a crawler list into buckets. Pure; never fails.
pub fn classify(crawlers: &[CrawlerInfo]) -> BucketSet {
    let mut set = BucketSet {
        all: crawlers.to_vec(),
        ..Default::default()
    };
    for crawler in crawlers {
        let target = match Partition::of(crawler) {
            Partition::Error => &mut set.error,
            Partition::Stopped => &mut set.stopped,
            Partition::Running => &mut set.running,
        };
        target.push(crawler.clone());
    }
    set
}
