//! Screen state and input handling for the terminal front end.
//!
//! Each screen owns a [`TimerGroup`] built from its [`ViewKind`]. Only the visible screen's
//! timers run; switching screens suspends the old group and resumes the new one, which makes
//! the new screen re-read the cache immediately.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ftui_data::{
    DataCategory, FetchError, RemoteSource, Scheduler, SourceName,
    config::DisplayConfig,
    model::Trade,
    view::{
        AllClosed, BotTab, ChartView, TimerGroup, ViewKind,
        aggregate::{all_open, default_chart_pair},
    },
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Control {
    Continue,
    Quit,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Screen {
    Dashboard,
    Bot,
    Settings,
}

impl Screen {
    pub const ALL: [Screen; 3] = [Screen::Dashboard, Screen::Bot, Screen::Settings];

    pub fn title(&self) -> &'static str {
        match self {
            Screen::Dashboard => "Dashboard [d]",
            Screen::Bot => "Bots [b]",
            Screen::Settings => "Settings [s]",
        }
    }
}

/// Result of an on-demand single trade lookup.
#[derive(Debug, Clone)]
pub struct TradeLookup {
    pub source: SourceName,
    pub trade_id: u64,
    pub result: Result<Trade, FetchError>,
}

#[derive(Debug)]
pub struct DashboardState {
    pub timers: TimerGroup,
    pub all_closed: AllClosed,
    /// Source shown in the cumulative profit chart, `None` for every bot.
    pub chart_filter: Option<SourceName>,
    pub selected: usize,
}

#[derive(Debug)]
pub struct BotState {
    pub timers: TimerGroup,
    pub tab: BotTab,
    pub source_index: usize,
    pub chart: Option<ChartView>,
    pub selected: usize,
}

#[derive(Debug)]
pub struct SettingsState {
    pub timers: TimerGroup,
    pub selected: usize,
}

#[derive(Debug)]
pub struct App {
    pub scheduler: Scheduler,
    pub display: DisplayConfig,
    pub screen: Screen,
    pub dashboard: DashboardState,
    pub bot: BotState,
    pub settings: SettingsState,
    /// Open trade info popup.
    pub trade_info: Option<TradeLookup>,
    pub show_help: bool,
    lookups_tx: mpsc::UnboundedSender<TradeLookup>,
    lookups_rx: mpsc::UnboundedReceiver<TradeLookup>,
    dirty: bool,
}

/// Cursor limited to the last row, matching what the tables highlight.
fn clamp(selected: usize, len: usize) -> usize {
    selected.min(len.saturating_sub(1))
}

fn timers_for(view: ViewKind, scheduler: &Scheduler, log_limit: u32, now: Instant) -> TimerGroup {
    let mut timers = TimerGroup::new();
    for cadence in view.cadences(log_limit) {
        timers.register(cadence, scheduler.config().period(cadence), now);
    }
    timers
}

impl App {
    pub fn new(scheduler: Scheduler, display: DisplayConfig, now: Instant) -> Self {
        let log_limit = display.log_limit;
        let tab = BotTab::OpenTrades;

        let mut bot_timers = timers_for(ViewKind::Bot(tab), &scheduler, log_limit, now);
        bot_timers.suspend();
        let mut settings_timers = timers_for(ViewKind::Settings, &scheduler, log_limit, now);
        settings_timers.suspend();

        let (lookups_tx, lookups_rx) = mpsc::unbounded_channel();

        Self {
            dashboard: DashboardState {
                timers: timers_for(ViewKind::Dashboard, &scheduler, log_limit, now),
                all_closed: AllClosed::new(),
                chart_filter: None,
                selected: 0,
            },
            bot: BotState {
                timers: bot_timers,
                tab,
                source_index: 0,
                chart: None,
                selected: 0,
            },
            settings: SettingsState {
                timers: settings_timers,
                selected: 0,
            },
            scheduler,
            display,
            screen: Screen::Dashboard,
            trade_info: None,
            show_help: false,
            lookups_tx,
            lookups_rx,
            dirty: true,
        }
    }

    pub fn view_kind(&self) -> ViewKind {
        match self.screen {
            Screen::Dashboard => ViewKind::Dashboard,
            Screen::Bot => ViewKind::Bot(self.bot.tab),
            Screen::Settings => ViewKind::Settings,
        }
    }

    fn timers_mut(&mut self) -> &mut TimerGroup {
        match self.screen {
            Screen::Dashboard => &mut self.dashboard.timers,
            Screen::Bot => &mut self.bot.timers,
            Screen::Settings => &mut self.settings.timers,
        }
    }

    fn timers(&self) -> &TimerGroup {
        match self.screen {
            Screen::Dashboard => &self.dashboard.timers,
            Screen::Bot => &self.bot.timers,
            Screen::Settings => &self.settings.timers,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Enabled sources in registration order.
    pub fn enabled_names(&self) -> Vec<SourceName> {
        self.scheduler
            .sources()
            .enabled()
            .map(|source| source.name().clone())
            .collect()
    }

    pub fn current_source(&self) -> Option<&Arc<RemoteSource>> {
        self.scheduler.sources().iter().nth(self.bot.source_index)
    }

    /// Poll the visible screen's timers. Returns whether the screen needs redrawing.
    pub fn tick(&mut self, now: Instant) -> bool {
        while let Ok(lookup) = self.lookups_rx.try_recv() {
            self.trade_info = Some(lookup);
            self.dirty = true;
        }

        let due = self.timers_mut().due(now);
        if due.is_empty() && !self.dirty {
            return false;
        }
        debug!(?due, screen = ?self.screen, "re-reading cache");
        self.pull();
        self.dirty = false;
        true
    }

    pub fn until_next(&self, now: Instant) -> Option<Duration> {
        if self.dirty {
            return Some(Duration::ZERO);
        }
        self.timers().until_next(now)
    }

    /// Refresh derived state from the cache for the visible screen.
    fn pull(&mut self) {
        match self.screen {
            Screen::Dashboard => {
                let names = self.enabled_names();
                self.dashboard
                    .all_closed
                    .refresh(self.scheduler.cache(), &names);
            }
            Screen::Bot => {
                self.ensure_chart();
                if let Some(chart) = self.bot.chart.as_mut() {
                    chart.pull(&self.scheduler);
                }
            }
            Screen::Settings => {}
        }
    }

    /// Open a chart for the current bot if none is showing.
    fn ensure_chart(&mut self) {
        if self.bot.chart.is_some() {
            return;
        }
        let Some(source) = self.current_source() else {
            return;
        };

        let cache = self.scheduler.cache();
        let open = cache.read(source.name(), &DataCategory::OpenTrades);
        let closed = cache.read(source.name(), &DataCategory::ClosedTrades);
        let pair = default_chart_pair(
            open.as_ref()
                .and_then(|snapshot| snapshot.payload()?.open_trades())
                .unwrap_or_default(),
            closed
                .as_ref()
                .and_then(|snapshot| snapshot.payload()?.closed_trades())
                .map(|rows| rows.as_slice())
                .unwrap_or_default(),
            &source.source().config().stake_currency,
        );

        let mut chart = ChartView::new(
            source.name().clone(),
            pair,
            source.source().config().timeframe.clone(),
            self.display.chart_bars,
        );
        debug!(source = %chart.source(), pair = chart.pair(), "opening chart");
        chart.attach(&self.scheduler);
        self.bot.chart = Some(chart);
    }

    fn close_chart(&mut self) {
        if let Some(chart) = self.bot.chart.take() {
            chart.detach(&self.scheduler);
        }
    }

    pub fn switch_screen(&mut self, screen: Screen, now: Instant) {
        if screen == self.screen {
            return;
        }
        self.timers_mut().suspend();
        if self.screen == Screen::Bot {
            self.close_chart();
        }
        self.screen = screen;
        self.timers_mut().resume(now);
        self.dirty = true;
    }

    pub fn set_bot_tab(&mut self, tab: BotTab, now: Instant) {
        self.bot.tab = tab;
        self.bot.selected = 0;
        self.bot.timers = timers_for(ViewKind::Bot(tab), &self.scheduler, self.display.log_limit, now);
        self.dirty = true;
    }

    fn cycle_bot(&mut self, forward: bool) {
        let count = self.scheduler.sources().len();
        if count == 0 {
            return;
        }
        self.bot.source_index = if forward {
            (self.bot.source_index + 1) % count
        } else {
            (self.bot.source_index + count - 1) % count
        };
        self.bot.selected = 0;
        self.close_chart();
        self.dirty = true;
    }

    fn cycle_chart_filter(&mut self, forward: bool) {
        let names = self.enabled_names();
        let position = self
            .dashboard
            .chart_filter
            .as_ref()
            .and_then(|filter| names.iter().position(|name| name == filter));

        // `None` sits before the first source
        let slots = names.len() + 1;
        let current = position.map_or(0, |index| index + 1);
        let next = if forward {
            (current + 1) % slots
        } else {
            (current + slots - 1) % slots
        };
        self.dashboard.chart_filter = next.checked_sub(1).and_then(|index| names.get(index).cloned());
        self.dirty = true;
    }

    fn selected_mut(&mut self) -> &mut usize {
        match self.screen {
            Screen::Dashboard => &mut self.dashboard.selected,
            Screen::Bot => &mut self.bot.selected,
            Screen::Settings => &mut self.settings.selected,
        }
    }

    fn toggle_selected_source(&mut self) {
        let sources = self.scheduler.sources();
        let index = clamp(self.settings.selected, sources.len());
        let Some(remote) = sources.iter().nth(index) else {
            return;
        };
        let enabled = remote.source().toggle();
        info!(source = %remote.name(), enabled, "source toggled");
        self.dirty = true;
    }

    /// Trade under the cursor of the visible screen.
    fn selected_trade(&self) -> Option<(SourceName, u64)> {
        let cache = self.scheduler.cache();
        match self.screen {
            Screen::Dashboard => {
                let rows = all_open(cache, &self.enabled_names());
                rows.get(clamp(self.dashboard.selected, rows.len()))
                    .map(|row| (row.source.clone(), row.trade.trade_id))
            }
            Screen::Bot => {
                let source = self.current_source()?.name().clone();
                let selected = self.bot.selected;
                let trade_id = match self.bot.tab {
                    BotTab::OpenTrades => {
                        let snapshot = cache.read(&source, &DataCategory::OpenTrades)?;
                        let rows = snapshot.payload()?.open_trades()?;
                        rows.get(clamp(selected, rows.len()))?.trade_id
                    }
                    BotTab::ClosedTrades => {
                        let snapshot = cache.read(&source, &DataCategory::ClosedTrades)?;
                        let rows = snapshot.payload()?.closed_trades()?;
                        rows.get(clamp(selected, rows.len()))?.trade_id
                    }
                    _ => return None,
                };
                Some((source, trade_id))
            }
            Screen::Settings => None,
        }
    }

    fn request_trade_info(&self) {
        let Some((source, trade_id)) = self.selected_trade() else {
            return;
        };
        let Some(remote) = self.scheduler.sources().get(&source).cloned() else {
            return;
        };

        let tx = self.lookups_tx.clone();
        tokio::spawn(async move {
            let result = remote.trade(trade_id).await;
            let _ = tx.send(TradeLookup {
                source,
                trade_id,
                result,
            });
        });
    }

    fn refresh(&mut self) {
        match self.screen {
            Screen::Bot => {
                if let Some(chart) = self.bot.chart.as_mut() {
                    let request = chart.refresh_now(&self.scheduler);
                    debug!(?request, pair = chart.pair(), "chart refresh");
                }
            }
            Screen::Dashboard | Screen::Settings => {
                let view = self.view_kind();
                for name in self.enabled_names() {
                    for category in view.categories(self.display.log_limit) {
                        self.scheduler.request_refresh(&name, category);
                    }
                }
            }
        }
        self.dirty = true;
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Control {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Control::Quit;
        }

        if self.trade_info.is_some() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
                self.trade_info = None;
                self.dirty = true;
            }
            return Control::Continue;
        }

        if self.show_help {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('h') | KeyCode::Char('q')) {
                self.show_help = false;
                self.dirty = true;
            }
            return Control::Continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Control::Quit,
            KeyCode::Char('h') => {
                self.show_help = true;
                self.dirty = true;
            }
            KeyCode::Char('d') => self.switch_screen(Screen::Dashboard, now),
            KeyCode::Char('b') => self.switch_screen(Screen::Bot, now),
            KeyCode::Char('s') => self.switch_screen(Screen::Settings, now),
            KeyCode::Char('r') => self.refresh(),
            KeyCode::Tab if self.screen == Screen::Bot => self.set_bot_tab(self.bot.tab.next(), now),
            KeyCode::BackTab if self.screen == Screen::Bot => {
                self.set_bot_tab(self.bot.tab.previous(), now)
            }
            KeyCode::Right => match self.screen {
                Screen::Bot => self.cycle_bot(true),
                Screen::Dashboard => self.cycle_chart_filter(true),
                Screen::Settings => {}
            },
            KeyCode::Left => match self.screen {
                Screen::Bot => self.cycle_bot(false),
                Screen::Dashboard => self.cycle_chart_filter(false),
                Screen::Settings => {}
            },
            KeyCode::Up => {
                let selected = self.selected_mut();
                *selected = selected.saturating_sub(1);
                self.dirty = true;
            }
            KeyCode::Down => {
                *self.selected_mut() += 1;
                self.dirty = true;
            }
            KeyCode::Enter | KeyCode::Char(' ') if self.screen == Screen::Settings => {
                self.toggle_selected_source()
            }
            KeyCode::Enter => self.request_trade_info(),
            _ => {}
        }
        Control::Continue
    }
}
