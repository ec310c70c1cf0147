//! Read side of the cache used by the terminal front end.
//!
//! A view declares the categories and cadences it needs through its [`ViewKind`], re-reads
//! the cache when its [`TimerGroup`] fires and renders each key through a [`PanelState`].
//! Views never fetch; the only path from a view to the network is
//! [`Scheduler::request_refresh`](crate::scheduler::Scheduler::request_refresh).

/// Cross-source aggregates derived from cached snapshots.
pub mod aggregate;

/// Candle window buffer and the chart that feeds it.
pub mod chart;

/// Screen and tab kinds with their category and cadence mapping.
pub mod kind;

/// Loading, fresh, stale and failed states of one cache key.
pub mod panel;

/// Visibility-scoped re-read timers.
pub mod timer;

pub use aggregate::{AllClosed, BotTrade, DashboardTotals, ProfitPoint, TradeSummary};
pub use chart::{ChartBuffer, ChartView};
pub use kind::{BotTab, ViewKind};
pub use panel::PanelState;
pub use timer::TimerGroup;
