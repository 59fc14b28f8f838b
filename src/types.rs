use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Derivative records (upstream feed)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    /// Single-stock futures contract.
    StockFuture,
    /// Single-stock option contract.
    StockOption,
    Other,
}

impl std::fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InstrumentKind::StockFuture => "stock_future",
            InstrumentKind::StockOption => "stock_option",
            InstrumentKind::Other => "other",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionSide {
    Call,
    Put,
    None,
}

/// One contract row for a ticker, as published by the upstream feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivativeRecord {
    pub kind: InstrumentKind,
    pub expiry: String,
    pub side: OptionSide,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub prev_close: f64,
    pub volume: f64,
}

// ---------------------------------------------------------------------------
// Per-symbol classification
// ---------------------------------------------------------------------------

/// Outcome of evaluating one ticker. Exactly one per evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ScanStatus {
    Success,
    ConditionNotMet,
    HttpError(u16),
    Timeout,
    TransportError(String),
}

impl ScanStatus {
    /// True for the transport-error family (HTTP status, timeout, transport).
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            ScanStatus::HttpError(_) | ScanStatus::Timeout | ScanStatus::TransportError(_)
        )
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStatus::Success => write!(f, "success"),
            ScanStatus::ConditionNotMet => write!(f, "condition_not_met"),
            ScanStatus::HttpError(code) => write!(f, "http_error({code})"),
            ScanStatus::Timeout => write!(f, "timeout"),
            ScanStatus::TransportError(msg) => write!(f, "transport_error({msg})"),
        }
    }
}

/// Open-equals-low / open-equals-high tallies for one side of the chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideCounts {
    pub open_low: u32,
    pub open_high: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolClassification {
    pub ticker: String,
    pub call: SideCounts,
    pub put: SideCounts,
    pub status: ScanStatus,
}

impl SymbolClassification {
    /// A classification with zeroed counters.
    pub fn with_status(ticker: &str, status: ScanStatus) -> Self {
        Self {
            ticker: ticker.to_string(),
            call: SideCounts::default(),
            put: SideCounts::default(),
            status,
        }
    }
}

// ---------------------------------------------------------------------------
// Scan results
// ---------------------------------------------------------------------------

/// Bullish entries carry (call open-low, put open-high); bearish entries carry
/// (put open-low, call open-high).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub ticker: String,
    pub primary: u32,
    pub secondary: u32,
}

/// One completed scan. Built once at the end of a run and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Millisecond epoch of completion, as a string.
    pub id: String,
    pub category: String,
    /// Local wall-clock time of completion (RFC 3339 with offset).
    pub timestamp: String,
    pub total_symbols: usize,
    pub scanned: usize,
    pub qualified: usize,
    #[serde(default)]
    pub errored: usize,
    pub elapsed_secs: f64,
    pub expiry: String,
    pub bullish: Vec<RankedEntry>,
    pub bearish: Vec<RankedEntry>,
}
