use serde::Deserialize;
use smol_str::SmolStr;
use std::fmt;

/// Static bot configuration from `/show_config`, captured once at registration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub bot_name: Option<SmolStr>,
    #[serde(default)]
    pub timeframe: SmolStr,
    #[serde(default)]
    pub trading_mode: Option<SmolStr>,
    #[serde(default)]
    pub stake_currency: SmolStr,
    #[serde(default)]
    pub strategy: Option<SmolStr>,
    #[serde(default)]
    pub state: Option<SmolStr>,
    #[serde(default)]
    pub runmode: Option<SmolStr>,
    #[serde(default)]
    pub exchange: Option<SmolStr>,
    #[serde(default)]
    pub max_open_trades: Option<f64>,
    #[serde(default)]
    pub stake_amount: Option<StakeAmount>,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StakeAmount {
    Fixed(f64),
    Other(SmolStr),
}

impl fmt::Display for StakeAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StakeAmount::Fixed(amount) => write!(f, "{amount}"),
            StakeAmount::Other(label) => write!(f, "{label}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VersionResponse {
    pub version: SmolStr,
}

/// Host load reported by `/sysinfo`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SysInfo {
    #[serde(default)]
    pub cpu_pct: Vec<f64>,
    #[serde(default)]
    pub ram_pct: f64,
}

impl SysInfo {
    pub fn cpu_mean(&self) -> Option<f64> {
        if self.cpu_pct.is_empty() {
            return None;
        }
        Some(self.cpu_pct.iter().sum::<f64>() / self.cpu_pct.len() as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogsResponse {
    pub logs: Vec<(String, f64, String, String, String)>,
}

/// One formatted log line: `time - logger - level - message`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub time: String,
    pub logger: String,
    pub level: String,
    pub message: String,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} - {} - {}",
            self.time, self.logger, self.level, self.message
        )
    }
}

impl From<LogsResponse> for Vec<LogLine> {
    fn from(response: LogsResponse) -> Self {
        response
            .logs
            .into_iter()
            .map(|(time, _, logger, level, message)| LogLine {
                time,
                logger,
                level,
                message,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WhitelistResponse {
    #[serde(default)]
    pub whitelist: Option<Vec<SmolStr>>,
}

/// Open trade slots from `/count`.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
pub struct TradeCount {
    pub current: u64,
    pub max: f64,
    #[serde(default)]
    pub total_stake: f64,
}
