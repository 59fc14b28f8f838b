use crate::error::{AppError, Result};

pub const UPSTREAM_BASE_URL: &str = "https://www.nseindia.com";

/// Browser-like user agent; the upstream rejects bare library agents.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Scans retained per category, newest first.
pub const JOURNAL_CAPACITY: usize = 30;

/// Entries kept in each ranked list.
pub const RANKED_LIST_LEN: usize = 10;

/// Maximum absolute deviation (percent) of a future's open from its previous close.
pub const MAX_OPEN_DEVIATION_PCT: f64 = 0.5;

/// Scheduler poll interval (seconds).
pub const SCHEDULER_POLL_SECS: u64 = 60;

/// A local time-of-day trigger, minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerTime {
    pub hour: u32,
    pub minute: u32,
}

impl TriggerTime {
    /// Parse `HH:MM` (24h).
    pub fn parse(s: &str) -> Option<Self> {
        let (h, m) = s.trim().split_once(':')?;
        let hour: u32 = h.parse().ok()?;
        let minute: u32 = m.parse().ok()?;
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self { hour, minute })
    }
}

impl std::fmt::Display for TriggerTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// One independent scan stream: its own journal, trigger times and target expiry.
#[derive(Debug, Clone)]
pub struct CategoryConfig {
    pub name: String,
    pub triggers: Vec<TriggerTime>,
    pub expiry: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub api_port: u16,
    pub upstream_base_url: String,
    /// Directory holding one journal document per category (JOURNAL_DIR)
    pub journal_dir: String,
    /// Max simultaneous upstream requests (GATE_CAPACITY)
    pub gate_capacity: usize,
    /// Per-request timeout (FETCH_TIMEOUT_SECS)
    pub fetch_timeout_secs: u64,
    /// Local offset from UTC in minutes (UTC_OFFSET_MINUTES). 330 = IST.
    pub utc_offset_minutes: i32,
    pub categories: Vec<CategoryConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let names: Vec<String> = std::env::var("SCAN_CATEGORIES")
            .unwrap_or_else(|_| "opening".to_string())
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if names.is_empty() {
            return Err(AppError::Config("SCAN_CATEGORIES must name at least one category".to_string()));
        }

        let mut categories = Vec::with_capacity(names.len());
        for name in names {
            let key = name.to_uppercase();
            let times_raw = std::env::var(format!("SCAN_{key}_TIMES"))
                .unwrap_or_else(|_| "09:20".to_string());
            let expiry_raw = std::env::var(format!("SCAN_{key}_EXPIRY")).ok();
            categories.push(category_from_parts(name, &times_raw, expiry_raw)?);
        }

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            upstream_base_url: std::env::var("UPSTREAM_BASE_URL")
                .unwrap_or_else(|_| UPSTREAM_BASE_URL.to_string()),
            journal_dir: std::env::var("JOURNAL_DIR").unwrap_or_else(|_| "data".to_string()),
            gate_capacity: std::env::var("GATE_CAPACITY")
                .unwrap_or_else(|_| "10".to_string())
                .parse::<usize>()
                .ok()
                .filter(|c| *c > 0)
                .unwrap_or(10),
            fetch_timeout_secs: std::env::var("FETCH_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse::<u64>()
                .unwrap_or(10),
            utc_offset_minutes: std::env::var("UTC_OFFSET_MINUTES")
                .unwrap_or_else(|_| "330".to_string())
                .parse::<i32>()
                .map_err(|_| AppError::Config("UTC_OFFSET_MINUTES must be an integer".to_string()))?,
            categories,
        })
    }
}

/// Build one category from its raw env values. The expiry is required: an empty
/// target would otherwise match every record whose expiry field is missing.
pub fn category_from_parts(name: String, times_raw: &str, expiry_raw: Option<String>) -> Result<CategoryConfig> {
    let key = name.to_uppercase();
    let triggers = parse_trigger_list(times_raw).ok_or_else(|| {
        AppError::Config(format!("SCAN_{key}_TIMES must be comma-separated HH:MM values"))
    })?;
    let expiry = expiry_raw
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::Config(format!("SCAN_{key}_EXPIRY must be set")))?;
    Ok(CategoryConfig { name, triggers, expiry })
}

/// Parse `"09:20,15:10"`. Empty input yields an empty list; any bad entry fails the whole list.
pub fn parse_trigger_list(s: &str) -> Option<Vec<TriggerTime>> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(TriggerTime::parse)
        .collect()
}
