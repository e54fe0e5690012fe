//! Presence sweeper
//!
//! Periodically evicts participants whose last heartbeat is older than the
//! staleness threshold and posts a departure notice for each of them.
//!
//! A tick works on a snapshot: list participants, compute the eviction set,
//! then apply each eviction under the registry gate after re-checking that
//! the participant is still stale. Failures are isolated per participant.
//!
//! With the defaults (15 s interval, 10 s threshold) a silent participant is
//! removed between 10 and 25 seconds after its last heartbeat.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::clock::Clock;
use super::registry::ParticipantRegistry;
use crate::common::{ChatError, ChatResult, Message, Participant};
use crate::messages::MessageStore;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_STALE_THRESHOLD: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    pub interval: Duration,
    pub stale_threshold: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SWEEP_INTERVAL,
            stale_threshold: DEFAULT_STALE_THRESHOLD,
        }
    }
}

/// Which step of an eviction failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepStage {
    Recheck,
    Evict,
    DepartureNotice,
}

#[derive(Debug)]
pub struct SweepFailure {
    pub name: String,
    pub stage: SweepStage,
    pub error: ChatError,
}

/// Outcome of one sweep tick
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Participants in the snapshot
    pub checked: usize,
    /// Removed from the registry (notice may still have failed, see `failures`)
    pub evicted: Vec<String>,
    pub failures: Vec<SweepFailure>,
}

pub struct PresenceSweeper {
    registry: Arc<ParticipantRegistry>,
    store: Arc<MessageStore>,
    clock: Arc<dyn Clock>,
    config: SweeperConfig,
    stale_threshold: TimeDelta,
}

impl PresenceSweeper {
    pub fn new(
        registry: Arc<ParticipantRegistry>,
        store: Arc<MessageStore>,
        clock: Arc<dyn Clock>,
        config: SweeperConfig,
    ) -> Self {
        let stale_threshold =
            TimeDelta::from_std(config.stale_threshold).unwrap_or(TimeDelta::MAX);
        Self {
            registry,
            store,
            clock,
            config,
            stale_threshold,
        }
    }

    fn is_stale(&self, participant: &Participant, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(participant.last_seen) > self.stale_threshold
    }

    /// Run one sweep tick.
    ///
    /// Only a failure to take the snapshot aborts the tick; everything after
    /// that is recorded per participant in the report.
    pub async fn sweep(&self) -> ChatResult<SweepReport> {
        let now = self.clock.now();
        let snapshot = self.registry.list_active()?;

        let stale: Vec<String> = snapshot
            .iter()
            .filter(|participant| self.is_stale(participant, now))
            .map(|participant| participant.name.clone())
            .collect();

        let mut report = SweepReport {
            checked: snapshot.len(),
            ..SweepReport::default()
        };

        for name in stale {
            self.evict_one(name, now, &mut report).await;
        }

        Ok(report)
    }

    async fn evict_one(&self, name: String, now: DateTime<Utc>, report: &mut SweepReport) {
        let guard = self.registry.lock().await;

        // A heartbeat may have landed between the snapshot and the lock
        match guard.find(&name) {
            Ok(Some(participant)) if self.is_stale(&participant, now) => {}
            Ok(_) => {
                log::debug!("{name} refreshed or left before eviction");
                return;
            }
            Err(error) => {
                log::error!("Sweep could not re-check {name}: {error}");
                report.failures.push(SweepFailure {
                    name,
                    stage: SweepStage::Recheck,
                    error,
                });
                return;
            }
        }

        if let Err(error) = guard.evict(&name) {
            log::error!("Failed to evict {name}: {error}");
            report.failures.push(SweepFailure {
                name,
                stage: SweepStage::Evict,
                error,
            });
            return;
        }
        log::info!("Participant {name} evicted after inactivity");

        // Still under the gate: a re-registration of the same name cannot
        // post its arrival before this departure.
        let notice = Message::departure(&name, self.clock.now());
        let notice_result = self.store.append(&notice);
        report.evicted.push(name.clone());
        if let Err(error) = notice_result {
            log::error!("Departure notice for {name} not stored: {error}");
            report.failures.push(SweepFailure {
                name,
                stage: SweepStage::DepartureNotice,
                error,
            });
        }
    }

    /// Spawn the periodic sweep task.
    ///
    /// The task stops when `shutdown` flips to `true` or its sender is
    /// dropped. Shutdown is only observed between ticks.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.config.interval;
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            log::info!(
                "Presence sweeper started (interval {:?}, threshold {:?})",
                self.config.interval,
                self.config.stale_threshold
            );

            loop {
                let ticked = tokio::select! {
                    _ = ticker.tick() => true,
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        false
                    }
                };
                if *shutdown.borrow() {
                    break;
                }
                if !ticked {
                    continue;
                }

                match self.sweep().await {
                    Ok(report) if !report.evicted.is_empty() || !report.failures.is_empty() => {
                        log::info!(
                            "Sweep: {} checked, {} evicted, {} failures",
                            report.checked,
                            report.evicted.len(),
                            report.failures.len()
                        );
                    }
                    Ok(_) => {}
                    Err(err) => log::error!("Sweep aborted, snapshot failed: {err}"),
                }
            }

            log::info!("Presence sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{MessageKind, StoreError};
    use crate::presence::clock::ManualClock;
    use crate::presence::registry::{DEFAULT_MAX_NAME_LEN, DEFAULT_NAME_PATTERN, NamePolicy};
    use crate::storage::{MemoryStorage, MessageRepository, ParticipantRepository};

    /// Refuses departure notices for one participant
    struct RejectNoticeFor {
        inner: MemoryStorage,
        name: &'static str,
    }

    impl MessageRepository for RejectNoticeFor {
        fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
            if message.from == self.name && message.kind == MessageKind::Status {
                return Err(StoreError::Unavailable("disk full".into()));
            }
            self.inner.insert_message(message)
        }

        fn list_messages(&self) -> Result<Vec<Message>, StoreError> {
            self.inner.list_messages()
        }
    }

    /// Lists participants but cannot look one up by name
    struct BrokenLookup {
        inner: MemoryStorage,
    }

    impl ParticipantRepository for BrokenLookup {
        fn insert_participant(&self, participant: &Participant) -> Result<(), StoreError> {
            self.inner.insert_participant(participant)
        }

        fn find_participant(&self, _name: &str) -> Result<Option<Participant>, StoreError> {
            Err(StoreError::Unavailable("lookup failed".into()))
        }

        fn touch_participant(&self, name: &str, last_seen: DateTime<Utc>) -> Result<bool, StoreError> {
            self.inner.touch_participant(name, last_seen)
        }

        fn delete_participant(&self, name: &str) -> Result<bool, StoreError> {
            self.inner.delete_participant(name)
        }

        fn list_participants(&self) -> Result<Vec<Participant>, StoreError> {
            self.inner.list_participants()
        }
    }

    struct Fixture {
        clock: Arc<ManualClock>,
        registry: Arc<ParticipantRegistry>,
        store: Arc<MessageStore>,
        sweeper: Arc<PresenceSweeper>,
    }

    fn fixture_with(messages: Arc<dyn MessageRepository>) -> Fixture {
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let policy = NamePolicy::new(DEFAULT_MAX_NAME_LEN, DEFAULT_NAME_PATTERN).unwrap();
        let registry = Arc::new(ParticipantRegistry::new(
            Arc::new(MemoryStorage::new()),
            clock.clone(),
            policy,
        ));
        let store = Arc::new(MessageStore::new(messages));
        let sweeper = Arc::new(PresenceSweeper::new(
            registry.clone(),
            store.clone(),
            clock.clone(),
            SweeperConfig::default(),
        ));
        Fixture {
            clock,
            registry,
            store,
            sweeper,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(MemoryStorage::new()))
    }

    fn departures(store: &MessageStore, name: &str) -> usize {
        store
            .list_all()
            .unwrap()
            .iter()
            .filter(|m| m.from == name && m.kind == MessageKind::Status)
            .count()
    }

    #[tokio::test]
    async fn test_sweep_evicts_only_stale() {
        let f = fixture();
        f.registry.register("old").await.unwrap();
        f.clock.advance(TimeDelta::seconds(5));
        f.registry.register("fresh").await.unwrap();
        f.clock.advance(TimeDelta::seconds(6));

        // old: 11s silent, fresh: 6s silent
        let report = f.sweeper.sweep().await.unwrap();

        assert_eq!(report.checked, 2);
        assert_eq!(report.evicted, vec!["old".to_string()]);
        assert!(report.failures.is_empty());
        assert!(!f.registry.exists("old").unwrap());
        assert!(f.registry.exists("fresh").unwrap());
        assert_eq!(departures(&f.store, "old"), 1);
        assert_eq!(departures(&f.store, "fresh"), 0);
    }

    #[tokio::test]
    async fn test_threshold_is_exclusive() {
        let f = fixture();
        f.registry.register("edge").await.unwrap();
        f.clock.advance(TimeDelta::seconds(10));

        let report = f.sweeper.sweep().await.unwrap();
        assert!(report.evicted.is_empty());
        assert!(f.registry.exists("edge").unwrap());

        f.clock.advance(TimeDelta::milliseconds(1));
        let report = f.sweeper.sweep().await.unwrap();
        assert_eq!(report.evicted, vec!["edge".to_string()]);
    }

    #[tokio::test]
    async fn test_second_sweep_does_not_repeat_departure() {
        let f = fixture();
        f.registry.register("A").await.unwrap();
        f.clock.advance(TimeDelta::seconds(30));

        f.sweeper.sweep().await.unwrap();
        let report = f.sweeper.sweep().await.unwrap();

        assert_eq!(report.checked, 0);
        assert_eq!(departures(&f.store, "A"), 1);
    }

    #[tokio::test]
    async fn test_heartbeat_keeps_participant() {
        let f = fixture();
        f.registry.register("A").await.unwrap();
        f.clock.advance(TimeDelta::seconds(9));
        f.registry.heartbeat("A").await.unwrap();
        f.clock.advance(TimeDelta::seconds(9));

        let report = f.sweeper.sweep().await.unwrap();
        assert!(report.evicted.is_empty());
        assert!(f.registry.exists("A").unwrap());
    }

    #[tokio::test]
    async fn test_heartbeat_during_sweep_prevents_eviction() {
        let f = fixture();
        f.registry.register("A").await.unwrap();
        f.clock.advance(TimeDelta::seconds(11));

        // Hold the gate so the sweep stops between its snapshot and the eviction
        let guard = f.registry.lock().await;
        let sweeper = f.sweeper.clone();
        let handle = tokio::spawn(async move { sweeper.sweep().await });
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert!(!handle.is_finished());

        f.clock.advance(TimeDelta::seconds(1));
        guard.heartbeat("A").unwrap();
        drop(guard);

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.checked, 1);
        assert!(report.evicted.is_empty());
        assert!(report.failures.is_empty());
        assert!(f.registry.exists("A").unwrap());
        assert_eq!(departures(&f.store, "A"), 0);
    }

    #[tokio::test]
    async fn test_recheck_failure_is_reported() {
        let f = fixture();
        let clock = f.clock.clone();
        let repo = Arc::new(BrokenLookup {
            inner: MemoryStorage::new(),
        });
        repo.insert_participant(&Participant::new("A", clock.now())).unwrap();
        let registry = Arc::new(ParticipantRegistry::new(
            repo.clone(),
            clock.clone(),
            NamePolicy::new(DEFAULT_MAX_NAME_LEN, DEFAULT_NAME_PATTERN).unwrap(),
        ));
        let sweeper = PresenceSweeper::new(
            registry,
            f.store.clone(),
            clock.clone(),
            SweeperConfig::default(),
        );
        clock.advance(TimeDelta::seconds(11));

        let report = sweeper.sweep().await.unwrap();

        assert!(report.evicted.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, SweepStage::Recheck);
        assert_eq!(repo.list_participants().unwrap().len(), 1);
        assert_eq!(departures(&f.store, "A"), 0);
    }

    #[tokio::test]
    async fn test_notice_failure_is_isolated() {
        let f = fixture_with(Arc::new(RejectNoticeFor {
            inner: MemoryStorage::new(),
            name: "B",
        }));
        // Arrival notices are not appended here: registry only
        for name in ["A", "B", "C"] {
            f.registry.register(name).await.unwrap();
        }
        f.clock.advance(TimeDelta::seconds(20));

        let report = f.sweeper.sweep().await.unwrap();

        assert_eq!(report.evicted.len(), 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "B");
        assert_eq!(report.failures[0].stage, SweepStage::DepartureNotice);
        assert!(f.registry.list_active().unwrap().is_empty());
        assert_eq!(departures(&f.store, "A"), 1);
        assert_eq!(departures(&f.store, "B"), 0);
        assert_eq!(departures(&f.store, "C"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_task_sweeps_and_stops() {
        let f = fixture();
        f.registry.register("A").await.unwrap();
        f.clock.advance(TimeDelta::seconds(11));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = f.sweeper.clone().spawn(shutdown_rx);

        // First tick fires one interval after start
        tokio::time::sleep(DEFAULT_SWEEP_INTERVAL - Duration::from_secs(1)).await;
        assert!(f.registry.exists("A").unwrap());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!f.registry.exists("A").unwrap());
        assert_eq!(departures(&f.store, "A"), 1);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
