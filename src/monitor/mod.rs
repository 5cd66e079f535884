// Monitor loop: collect every target, keep what is new, notify, persist.
//
// One round walks the targets in order through a single page session, then
// sends notifications newest first and saves the seen-item store. Rounds
// repeat on a fixed interval until the cancellation token fires. The store is
// reloaded from disk at the start of each round, so a round that aborts
// before saving leaves its items to be detected again next time.

pub mod aggregate;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::feed::collector::{collect, CollectOptions, Collection, FeedLayout, StopReason};
use crate::feed::window::{cutoff, filter_window};
use crate::feed::Item;
use crate::notify::Dispatcher;
use crate::observe::{MonitorEvent, MonitorObserver};
use crate::session::PageSession;
use crate::store::SeenStore;

use self::aggregate::{aggregate, partition_new};

/// Where a round currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundPhase {
    Idle,
    Collecting { source: String },
    Filtering,
    Aggregating,
    Dispatching,
    Persisting,
    Sleeping,
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub targets: Vec<String>,
    pub interval: Duration,
    pub days_limit: i64,
    pub max_items: usize,
    pub max_scroll_attempts: usize,
    pub settle_delay: Duration,
    pub seen_path: PathBuf,
    /// Failure captures are written here when set.
    pub capture_dir: Option<PathBuf>,
}

/// What one source contributed to a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source: String,
    pub collected: usize,
    pub in_window: usize,
    pub fresh: usize,
    pub stop: StopReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    pub round: u64,
    pub sources: Vec<SourceReport>,
    /// Ids of new items in dispatch order.
    pub dispatched: Vec<String>,
    pub delivered: usize,
    /// Cancellation arrived mid-round; nothing was sent or saved.
    pub cancelled: bool,
}

pub struct Monitor {
    session: Box<dyn PageSession>,
    layout: FeedLayout,
    dispatcher: Dispatcher,
    settings: MonitorSettings,
    observer: Arc<dyn MonitorObserver>,
    rounds: u64,
}

impl Monitor {
    pub fn new(
        session: Box<dyn PageSession>,
        layout: FeedLayout,
        dispatcher: Dispatcher,
        settings: MonitorSettings,
        observer: Arc<dyn MonitorObserver>,
    ) -> Self {
        Self {
            session,
            layout,
            dispatcher,
            settings,
            observer,
            rounds: 0,
        }
    }

    /// Run rounds until `cancel` fires. A failed round is reported and the
    /// loop carries on after the usual interval. Returns the rounds started.
    pub async fn run(&mut self, cancel: CancellationToken) -> u64 {
        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.run_round(&cancel).await {
                Ok(report) if report.cancelled => break,
                Ok(_) => {}
                Err(e) => self.emit(MonitorEvent::RoundAborted {
                    round: self.rounds,
                    error: format!("{e:#}"),
                }),
            }

            if cancel.is_cancelled() {
                self.emit(MonitorEvent::CancelRequested { round: self.rounds });
                break;
            }

            self.phase(RoundPhase::Sleeping);
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.emit(MonitorEvent::CancelRequested { round: self.rounds });
                    break;
                }
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
            self.phase(RoundPhase::Idle);
        }
        self.rounds
    }

    pub async fn run_round(&mut self, cancel: &CancellationToken) -> Result<RoundReport> {
        let now = Utc::now().naive_utc();
        self.run_round_at(now, cancel).await
    }

    /// One full round with `now` as the reference time. Errors only come
    /// from saving the store; nothing is persisted in that case.
    pub async fn run_round_at(
        &mut self,
        now: NaiveDateTime,
        cancel: &CancellationToken,
    ) -> Result<RoundReport> {
        self.rounds += 1;
        let round = self.rounds;
        self.emit(MonitorEvent::RoundStarted { round });

        let seen_path = self.settings.seen_path.clone();
        let (mut store, load_err) = SeenStore::load_or_empty(&seen_path);
        if let Some(e) = load_err {
            self.emit(MonitorEvent::StoreCorrupt {
                path: seen_path.display().to_string(),
                error: e.to_string(),
            });
        }

        let window_start = cutoff(now, self.settings.days_limit);
        let mut options = CollectOptions::new(now, window_start);
        options.max_items = self.settings.max_items;
        options.max_scroll_attempts = self.settings.max_scroll_attempts;
        options.settle_delay = self.settings.settle_delay;

        let mut report = RoundReport {
            round,
            sources: Vec::new(),
            dispatched: Vec::new(),
            delivered: 0,
            cancelled: false,
        };
        let mut batches = Vec::with_capacity(self.settings.targets.len());

        for source in self.settings.targets.clone() {
            self.phase(RoundPhase::Collecting {
                source: source.clone(),
            });
            self.emit(MonitorEvent::CollectionStarted {
                source: source.clone(),
                days_limit: self.settings.days_limit,
                max_items: self.settings.max_items,
            });

            let collection = collect(
                self.session.as_mut(),
                &self.layout,
                &source,
                &options,
                self.observer.as_ref(),
            )
            .await;
            self.save_capture(&collection).await;

            self.phase(RoundPhase::Filtering);
            let (fresh, source_report) = self.filter_new(collection, window_start, &mut store);
            report.sources.push(source_report);
            batches.push(fresh);

            if cancel.is_cancelled() {
                self.emit(MonitorEvent::CancelRequested { round });
                report.cancelled = true;
                return Ok(report);
            }
        }

        self.phase(RoundPhase::Aggregating);
        let queue = aggregate(batches);

        self.phase(RoundPhase::Dispatching);
        if !queue.is_empty() {
            self.emit(MonitorEvent::DispatchPlanned {
                count: queue.len(),
            });
        }
        for item in &queue {
            if self.dispatcher.send(item).await {
                report.delivered += 1;
            }
            report.dispatched.push(item.id().to_string());
        }

        self.phase(RoundPhase::Persisting);
        store
            .save(&seen_path)
            .with_context(|| format!("Failed to save seen-item store in round {round}"))?;
        self.emit(MonitorEvent::StoreSaved {
            path: seen_path.display().to_string(),
            count: store.len(),
        });

        self.emit(MonitorEvent::RoundFinished {
            round,
            new_items: queue.len(),
            next_check: self.settings.interval,
        });
        self.phase(RoundPhase::Idle);
        Ok(report)
    }

    fn filter_new(
        &self,
        collection: Collection,
        window_start: NaiveDateTime,
        store: &mut SeenStore,
    ) -> (Vec<Item>, SourceReport) {
        let collected = collection.items.len();
        let in_window = filter_window(collection.items, window_start);
        let in_window_count = in_window.len();
        let (fresh, seen) = partition_new(in_window, store);

        for (item, is_new) in fresh
            .iter()
            .map(|i| (i, true))
            .chain(seen.iter().map(|i| (i, false)))
        {
            self.emit(MonitorEvent::ItemDetected {
                source: item.source().to_string(),
                id: item.id().to_string(),
                timestamp: item.timestamp(),
                text: item.text().to_string(),
                is_new,
            });
        }

        self.emit(MonitorEvent::SourceChecked {
            source: collection.source.clone(),
            collected,
            in_window: in_window_count,
            fresh: fresh.len(),
        });

        let report = SourceReport {
            source: collection.source,
            collected,
            in_window: in_window_count,
            fresh: fresh.len(),
            stop: collection.stop,
        };
        (fresh, report)
    }

    async fn save_capture(&self, collection: &Collection) {
        let (Some(dir), Some(failure)) = (&self.settings.capture_dir, &collection.failure) else {
            return;
        };
        let Some(bytes) = &failure.capture else {
            return;
        };

        let path = dir.join(capture_file_name(&collection.source));
        let written = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, bytes).await
        }
        .await;

        let event = match written {
            Ok(()) => MonitorEvent::CaptureSaved {
                source: collection.source.clone(),
                path: path.display().to_string(),
            },
            Err(e) => MonitorEvent::CaptureFailed {
                source: collection.source.clone(),
                error: e.to_string(),
            },
        };
        self.emit(event);
    }

    fn phase(&self, phase: RoundPhase) {
        self.emit(MonitorEvent::PhaseChanged {
            round: self.rounds,
            phase,
        });
    }

    fn emit(&self, event: MonitorEvent) {
        self.observer.on_event(&event);
    }
}

/// `error_<source>.png`, with anything unsafe in a file name replaced.
pub fn capture_file_name(source: &str) -> String {
    let safe: String = source
        .trim_start_matches('@')
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("error_{safe}.png")
}
