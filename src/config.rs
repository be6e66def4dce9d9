use clap::ValueEnum;

/// Default WTT3 endpoint used when neither `--api-url` nor `WTT3_API_URL` is set.
pub const DEFAULT_API_URL: &str = "https://wtt3.docs.apiary.io";

/// Per-request timeout for calls to the timetable API.
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// Which upstream WTT3 protocol a deployment talks to.
///
/// `Rest` is the newer ranged endpoint (`/reservations?start=..&end=..`);
/// `DayFeed` is the older per-day schedule feed (`/scheduleDateDetail?date=..`)
/// that mixes reservation and non-reservation entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ApiVariant {
    Rest,
    DayFeed,
}

/// Resolved source configuration for one import run.
///
/// Built once at the call boundary (CLI flags with environment fallbacks)
/// and passed into the importer, so no deep code reads ambient settings.
#[derive(Debug, Clone)]
pub struct ImportSource {
    pub base_url: String,
    pub api_key: Option<String>,
    pub variant: ApiVariant,
    /// How many day fetches run concurrently in the day-feed variant.
    pub fetch_concurrency: usize,
}

impl ImportSource {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, variant: ApiVariant) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            variant,
            fetch_concurrency: 4,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.fetch_concurrency = n.max(1);
        self
    }
}
