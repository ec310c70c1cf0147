use crate::category::{Cadence, DataCategory};
use itertools::Itertools;

/// Tabs of the per-bot screen.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, derive_more::Display)]
pub enum BotTab {
    #[display("Open Trades")]
    OpenTrades,
    #[display("Closed Trades")]
    ClosedTrades,
    #[display("Tag Summary")]
    TagSummary,
    #[display("Performance")]
    Performance,
    #[display("Logs")]
    Logs,
    #[display("System")]
    System,
    #[display("Whitelist")]
    Whitelist,
}

impl BotTab {
    pub const ALL: [BotTab; 7] = [
        BotTab::OpenTrades,
        BotTab::ClosedTrades,
        BotTab::TagSummary,
        BotTab::Performance,
        BotTab::Logs,
        BotTab::System,
        BotTab::Whitelist,
    ];

    pub fn index(&self) -> usize {
        Self::ALL
            .iter()
            .position(|tab| tab == self)
            .unwrap_or_default()
    }

    pub fn next(&self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn previous(&self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    pub fn categories(&self, log_limit: u32) -> Vec<DataCategory> {
        match self {
            BotTab::OpenTrades => vec![DataCategory::OpenTrades, DataCategory::TradeCount],
            BotTab::ClosedTrades => vec![DataCategory::ClosedTrades],
            BotTab::TagSummary => vec![DataCategory::TagSummary],
            BotTab::Performance => vec![DataCategory::Performance],
            BotTab::Logs => vec![DataCategory::Logs(log_limit)],
            BotTab::System => vec![DataCategory::SysInfo],
            BotTab::Whitelist => vec![DataCategory::Whitelist],
        }
    }
}

/// Every screen of the terminal front end.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ViewKind {
    Dashboard,
    Bot(BotTab),
    Settings,
}

impl ViewKind {
    /// Cache keys the view reads for one source.
    pub fn categories(&self, log_limit: u32) -> Vec<DataCategory> {
        match self {
            ViewKind::Dashboard => vec![
                DataCategory::OpenTrades,
                DataCategory::ClosedTrades,
                DataCategory::ProfitSummary,
                DataCategory::DailyProfit(2),
                DataCategory::WeeklyProfit(2),
                DataCategory::MonthlyProfit(2),
            ],
            ViewKind::Bot(tab) => {
                let mut categories = vec![DataCategory::ProfitSummary];
                categories.extend(tab.categories(log_limit));
                categories
            }
            ViewKind::Settings => vec![],
        }
    }

    /// Cadences at which the view re-reads the cache.
    pub fn cadences(&self, log_limit: u32) -> Vec<Cadence> {
        match self {
            ViewKind::Settings => vec![Cadence::Fast],
            ViewKind::Dashboard | ViewKind::Bot(_) => self
                .categories(log_limit)
                .iter()
                .map(DataCategory::cadence)
                .unique()
                .sorted()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_kind_cadences() {
        struct TestCase {
            input: ViewKind,
            expected: Vec<Cadence>,
        }

        let tests = vec![
            TestCase {
                // TC0: dashboard mixes open trades and period profit
                input: ViewKind::Dashboard,
                expected: vec![Cadence::Fast, Cadence::Medium],
            },
            TestCase {
                // TC1: whitelist tab plus the header summary
                input: ViewKind::Bot(BotTab::Whitelist),
                expected: vec![Cadence::Fast, Cadence::Slow],
            },
            TestCase {
                // TC2: open trades tab is fast only
                input: ViewKind::Bot(BotTab::OpenTrades),
                expected: vec![Cadence::Fast],
            },
            TestCase {
                // TC3: settings polls source health
                input: ViewKind::Settings,
                expected: vec![Cadence::Fast],
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.cadences(100);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_bot_tab_categories_use_log_limit() {
        assert_eq!(BotTab::Logs.categories(25), vec![DataCategory::Logs(25)]);
        assert_eq!(
            ViewKind::Bot(BotTab::System).categories(25),
            vec![DataCategory::ProfitSummary, DataCategory::SysInfo]
        );
    }

    #[test]
    fn test_bot_tab_cycles() {
        assert_eq!(BotTab::OpenTrades.next(), BotTab::ClosedTrades);
        assert_eq!(BotTab::Whitelist.next(), BotTab::OpenTrades);
        assert_eq!(BotTab::OpenTrades.previous(), BotTab::Whitelist);
        assert_eq!(BotTab::Logs.to_string(), "Logs");
        assert_eq!(BotTab::TagSummary.index(), 2);
    }
}
