#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::unused_self,
    rust_2018_idioms,
    missing_debug_implementations
)]
#![allow(clippy::type_complexity)]

//! # Ftui-Data
//! Polling, caching and view subscription core for monitoring one or more freqtrade bots
//! over their REST APIs.
//!
//! * **RemoteSource**: typed, timeout-bounded fetches of every [`DataCategory`] from one bot,
//!   including paginated closed trade history with a count-based memo.
//! * **SnapshotCache**: two-level `source -> category` map of immutable snapshots, swapped
//!   atomically so readers never observe a partial write.
//! * **Scheduler**: fast, medium and slow cadence loops fanning out across enabled sources,
//!   with per-key coalescing and a bounded fetch pool.
//! * **View layer**: screen kinds mapped to categories, visibility-scoped timers, panel
//!   states and an incrementally merged candle window.
//!
//! ## Example
//! ```rust,no_run
//! use ftui_data::{
//!     cache::SnapshotCache,
//!     category::DataCategory,
//!     config::Config,
//!     scheduler::{Scheduler, SchedulerConfig},
//!     source::registry::SourceSet,
//! };
//! use std::{path::Path, sync::Arc};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(Path::new("ftui.toml"))?.with_env_overrides()?;
//!     config.validate()?;
//!
//!     let (sources, _failures) =
//!         SourceSet::register(&config.servers, config.refresh.timeout()).await;
//!     let scheduler = Scheduler::new(
//!         Arc::new(sources),
//!         Arc::new(SnapshotCache::new()),
//!         SchedulerConfig::from(&config),
//!     );
//!     let _loops = scheduler.start();
//!
//!     for source in scheduler.sources().iter() {
//!         let snapshot = scheduler.cache().read(source.name(), &DataCategory::OpenTrades);
//!         println!("{}: {:?}", source.name(), snapshot.map(|snapshot| snapshot.outcome.clone()));
//!     }
//!     Ok(())
//! }
//! ```

/// Shared snapshot cache and the per-key in-flight ticket.
pub mod cache;

/// [`DataCategory`] and its [`Cadence`].
pub mod category;

/// TOML configuration with environment overrides.
pub mod config;

/// All errors generated in `ftui-data`.
pub mod error;

/// Normalized records parsed from the freqtrade REST API.
pub mod model;

/// Normalized rows of one fetched category.
pub mod payload;

/// Cadence loops, fan-out and out-of-cycle refresh requests.
pub mod scheduler;

/// Remote bot identity, the REST adapter and startup registration.
pub mod source;

/// Timers, panel states, charts and aggregates consumed by the terminal front end.
pub mod view;

pub use cache::{Outcome, Snapshot, SnapshotCache};
pub use category::{Cadence, CandleKey, DataCategory};
pub use error::{ErrorKind, FetchError};
pub use payload::Payload;
pub use scheduler::{RefreshRequest, Scheduler, SchedulerConfig};
pub use source::{RemoteSource, Source, SourceName};
