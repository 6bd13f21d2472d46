//! Metrics engine: owns the module instances and runs poll rounds.
//!
//! The engine reads its settings once at construction, creates every enabled
//! module in registry order and then, on each [`Engine::poll`], asks every
//! live module to emit into one shared [`SnapshotBuilder`]. It never sleeps;
//! pacing rounds by [`Engine::interval`] is the caller's job.

use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::collector::FileSystem;
use crate::config::{ConfigSource, EngineConfig, EngineOptions, ModuleSettings};
use crate::error::{ErrorKind, Result, SysmonError};
use crate::module::{Module, ModuleContext, ModuleDescriptor, builtin_registry};
use crate::snapshot::{Snapshot, SnapshotBuilder};

/// Name of the synthetic metric recorded when a module fails a round.
pub fn error_metric_name(module: &str) -> String {
    format!("module.{}.error", module)
}

/// Diagnostic view of one registered module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleStatus {
    pub name: &'static str,
    /// False when disabled by configuration or not supported on this host.
    pub enabled: bool,
    pub refresh_ms: u32,
    /// Engine time of the last successful refresh.
    pub last_refresh_ms: Option<u64>,
}

struct ModuleSlot {
    name: &'static str,
    settings: ModuleSettings,
    module: Option<Box<dyn Module>>,
    last_refresh_ms: Option<u64>,
}

impl ModuleSlot {
    fn refresh_due(&self, now_ms: u64) -> bool {
        if self.settings.refresh_ms == 0 {
            return true;
        }
        match self.last_refresh_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= u64::from(self.settings.refresh_ms),
        }
    }
}

/// Polls a fixed set of metric modules into snapshots.
///
/// Not thread-safe by itself: one round runs to completion before the next
/// can start. Independent engines share no state.
pub struct Engine {
    config: EngineConfig,
    slots: Vec<ModuleSlot>,
    clock: Box<dyn Clock>,
    last_error: Option<String>,
}

impl Engine {
    /// Creates an engine over the built-in modules.
    pub fn new<F>(config: &dyn ConfigSource, fs: F, options: &EngineOptions) -> Result<Self>
    where
        F: FileSystem + Clone + 'static,
    {
        Self::with_registry(config, fs, options, &builtin_registry::<F>())
    }

    /// Creates an engine over an explicit list of module descriptors.
    ///
    /// Modules that report `NotSupported` are kept as disabled slots. Any
    /// other creation failure drops the modules built so far and is returned.
    pub fn with_registry<F>(
        config: &dyn ConfigSource,
        fs: F,
        options: &EngineOptions,
        registry: &[ModuleDescriptor<F>],
    ) -> Result<Self>
    where
        F: FileSystem + Clone + 'static,
    {
        if registry.is_empty() {
            return Err(SysmonError::Internal(
                "no module variants registered".to_string(),
            ));
        }

        let engine_config = EngineConfig::from_source(config)?;

        let mut slots = Vec::new();
        slots.try_reserve_exact(registry.len())?;

        for descriptor in registry {
            let settings = ModuleSettings::from_source(config, descriptor.name)?;
            let module = if settings.enabled {
                let ctx = ModuleContext::new(descriptor.name, config, &fs, options);
                match (descriptor.create)(&ctx) {
                    Ok(module) => {
                        debug!(
                            module = descriptor.name,
                            refresh_ms = settings.refresh_ms,
                            "module enabled"
                        );
                        Some(module)
                    }
                    Err(e) if e.kind() == ErrorKind::NotSupported => {
                        info!(module = descriptor.name, reason = %e, "module disabled");
                        None
                    }
                    Err(e) => {
                        error!(module = descriptor.name, error = %e, "module creation failed");
                        return Err(e);
                    }
                }
            } else {
                debug!(module = descriptor.name, "module disabled by configuration");
                None
            };

            slots.push(ModuleSlot {
                name: descriptor.name,
                settings,
                module,
                last_refresh_ms: None,
            });
        }

        Ok(Self {
            config: engine_config,
            slots,
            clock: Box::new(MonotonicClock::new()),
            last_error: None,
        })
    }

    /// Replaces the time source used to schedule refreshes.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Runs one poll round.
    ///
    /// Every live module sees the same `now`. A module failing with a
    /// non-fatal error contributes only a `module.<name>.error` string; an
    /// allocation failure discards the round and is returned.
    pub fn poll(&mut self) -> Result<Snapshot> {
        let started = Instant::now();
        let now_ms = self.clock.now_ms();
        let mut builder = SnapshotBuilder::new();

        for slot in &mut self.slots {
            let refresh_due = slot.refresh_due(now_ms);
            let Some(module) = slot.module.as_mut() else {
                continue;
            };

            let mark = builder.len();
            match module.poll(now_ms, refresh_due, &mut builder) {
                Ok(()) => {
                    if refresh_due {
                        slot.last_refresh_ms = Some(now_ms);
                    }
                }
                Err(e) if e.is_fatal() => {
                    error!(module = slot.name, error = %e, "poll round aborted");
                    self.last_error = Some(e.to_string());
                    return Err(e);
                }
                Err(e) => {
                    warn!(module = slot.name, error = %e, "module poll failed");
                    builder.rollback_to(mark);
                    let recorded =
                        builder.add_string(&error_metric_name(slot.name), None, &e.to_string());
                    if let Err(fatal) = recorded {
                        error!(error = %fatal, "poll round aborted");
                        self.last_error = Some(fatal.to_string());
                        return Err(fatal);
                    }
                    self.last_error = Some(e.to_string());
                }
            }
        }

        let snapshot = builder.finalize();
        debug!(
            metrics = snapshot.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "poll round complete"
        );
        Ok(snapshot)
    }

    /// Interval the caller should wait between rounds.
    pub fn interval(&self) -> Duration {
        self.config.interval()
    }

    pub fn interval_ms(&self) -> u32 {
        self.config.interval_ms
    }

    /// Most recent error seen by [`Engine::poll`], if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Status of every registered module, in registry order.
    pub fn modules(&self) -> impl Iterator<Item = ModuleStatus> + '_ {
        self.slots.iter().map(|slot| ModuleStatus {
            name: slot.name,
            enabled: slot.module.is_some(),
            refresh_ms: slot.settings.refresh_ms,
            last_refresh_ms: slot.last_refresh_ms,
        })
    }

    /// Number of modules that take part in poll rounds.
    pub fn enabled_count(&self) -> usize {
        self.slots.iter().filter(|s| s.module.is_some()).count()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        debug!(modules = self.slots.len(), "engine dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::collector::MockFs;
    use crate::config::IniConfig;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(text: &str) -> IniConfig {
        IniConfig::parse_str(text).unwrap()
    }

    fn engine(fs: &MockFs, text: &str, clock: &ManualClock) -> Engine {
        Engine::new(&config(text), fs.clone(), &EngineOptions::default())
            .unwrap()
            .with_clock(clock.clone())
    }

    fn names_with_prefix(snapshot: &Snapshot, prefix: &str) -> usize {
        snapshot
            .iter()
            .filter(|m| m.name().starts_with(prefix))
            .count()
    }

    /// Counts its own refreshes and reports the engine time it was given.
    struct CountingModule {
        refreshes: u64,
        sampled: bool,
    }

    impl Module for CountingModule {
        fn name(&self) -> &'static str {
            "counter"
        }

        fn poll(&mut self, now_ms: u64, refresh_due: bool, b: &mut SnapshotBuilder) -> Result<()> {
            if refresh_due || !self.sampled {
                self.refreshes += 1;
                self.sampled = true;
            }
            b.add_uint64("counter.refreshes", None, self.refreshes)?;
            b.add_uint64("counter.now_ms", Some("ms"), now_ms)
        }
    }

    fn create_counting(_ctx: &ModuleContext<'_, MockFs>) -> Result<Box<dyn Module>> {
        Ok(Box::new(CountingModule {
            refreshes: 0,
            sampled: false,
        }))
    }

    /// Emits one metric, then fails while `/fail` exists.
    struct FlakyModule {
        fs: MockFs,
    }

    impl Module for FlakyModule {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn poll(&mut self, _now_ms: u64, _due: bool, b: &mut SnapshotBuilder) -> Result<()> {
            b.add_double("flaky.partial", None, 1.0)?;
            if self.fs.exists(Path::new("/fail")) {
                return Err(SysmonError::io(
                    "failed to read /fail",
                    std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                ));
            }
            b.add_double("flaky.done", None, 2.0)
        }
    }

    fn create_flaky(ctx: &ModuleContext<'_, MockFs>) -> Result<Box<dyn Module>> {
        Ok(Box::new(FlakyModule {
            fs: ctx.fs.clone(),
        }))
    }

    static TRACKED_CREATED: AtomicUsize = AtomicUsize::new(0);
    static TRACKED_LIVE: AtomicUsize = AtomicUsize::new(0);

    /// Counts live instances so tests can see when the engine drops them.
    struct TrackedModule;

    impl Module for TrackedModule {
        fn name(&self) -> &'static str {
            "tracked"
        }

        fn poll(&mut self, _now_ms: u64, _due: bool, _b: &mut SnapshotBuilder) -> Result<()> {
            Ok(())
        }
    }

    impl Drop for TrackedModule {
        fn drop(&mut self) {
            TRACKED_LIVE.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn create_tracked(_ctx: &ModuleContext<'_, MockFs>) -> Result<Box<dyn Module>> {
        TRACKED_CREATED.fetch_add(1, Ordering::SeqCst);
        TRACKED_LIVE.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(TrackedModule))
    }

    struct OomModule;

    impl Module for OomModule {
        fn name(&self) -> &'static str {
            "oom"
        }

        fn poll(&mut self, _now_ms: u64, _due: bool, _b: &mut SnapshotBuilder) -> Result<()> {
            Err(SysmonError::OutOfMemory("simulated".to_string()))
        }
    }

    fn create_oom(_ctx: &ModuleContext<'_, MockFs>) -> Result<Box<dyn Module>> {
        Ok(Box::new(OomModule))
    }

    fn create_unsupported(_ctx: &ModuleContext<'_, MockFs>) -> Result<Box<dyn Module>> {
        Err(SysmonError::not_supported("no such hardware"))
    }

    fn create_broken(_ctx: &ModuleContext<'_, MockFs>) -> Result<Box<dyn Module>> {
        Err(SysmonError::Internal("probe exploded".to_string()))
    }

    fn fake_engine(
        fs: &MockFs,
        text: &str,
        registry: &[ModuleDescriptor<MockFs>],
        clock: &ManualClock,
    ) -> Result<Engine> {
        Ok(
            Engine::with_registry(&config(text), fs.clone(), &EngineOptions::default(), registry)?
                .with_clock(clock.clone()),
        )
    }

    #[test]
    fn test_laptop_round_has_every_module() {
        let fs = MockFs::typical_laptop();
        let clock = ManualClock::new(0);
        let mut engine = engine(&fs, "", &clock);
        assert_eq!(engine.enabled_count(), 5);

        let snapshot = engine.poll().unwrap();
        for prefix in ["cpu.", "ram.", "battery.", "network.", "storage."] {
            assert!(names_with_prefix(&snapshot, prefix) > 0, "missing {}", prefix);
        }
        assert_eq!(engine.last_error(), None);
    }

    #[test]
    fn test_module_order_in_snapshot() {
        let fs = MockFs::typical_laptop();
        let clock = ManualClock::new(0);
        let mut engine = engine(&fs, "", &clock);
        let snapshot = engine.poll().unwrap();

        let mut seen: Vec<&str> = Vec::new();
        for metric in &snapshot {
            let module = metric.name().split('.').next().unwrap();
            if seen.last() != Some(&module) {
                seen.push(module);
            }
        }
        assert_eq!(seen, vec!["cpu", "ram", "battery", "network", "storage"]);
    }

    #[test]
    fn test_disabled_battery_never_reported() {
        let fs = MockFs::typical_laptop();
        let clock = ManualClock::new(0);
        let mut engine = engine(&fs, "[module.battery]\nenabled = 0\n", &clock);

        for _ in 0..3 {
            let snapshot = engine.poll().unwrap();
            assert_eq!(names_with_prefix(&snapshot, "battery."), 0);
            clock.advance(1000);
        }
        let battery = engine.modules().find(|m| m.name == "battery").unwrap();
        assert!(!battery.enabled);
    }

    #[test]
    fn test_missing_battery_demotes_module() {
        let fs = MockFs::headless_server();
        let clock = ManualClock::new(0);
        let mut engine = engine(&fs, "", &clock);

        assert_eq!(engine.enabled_count(), 4);
        let snapshot = engine.poll().unwrap();
        assert_eq!(names_with_prefix(&snapshot, "battery."), 0);
        assert_eq!(names_with_prefix(&snapshot, "module."), 0);
        assert_eq!(
            snapshot.find("network.interface").unwrap().value().as_str(),
            Some("eth0")
        );
    }

    #[test]
    fn test_non_numeric_refresh_is_parse_error() {
        let fs = MockFs::typical_laptop();
        let result = Engine::new(
            &config("[module.cpu]\nrefresh_ms = soon\n"),
            fs,
            &EngineOptions::default(),
        );
        assert_eq!(result.err().unwrap().kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_invalid_interval_is_parse_error() {
        let fs = MockFs::typical_laptop();
        for text in ["[sysmon]\ninterval_ms = 0\n", "[sysmon]\ninterval_ms = -5\n"] {
            let result = Engine::new(&config(text), fs.clone(), &EngineOptions::default());
            assert_eq!(result.err().unwrap().kind(), ErrorKind::Parse);
        }
    }

    #[test]
    fn test_interval_from_config() {
        let fs = MockFs::typical_laptop();
        let clock = ManualClock::new(0);
        let engine = engine(&fs, "[sysmon]\ninterval_ms = 250\n", &clock);
        assert_eq!(engine.interval_ms(), 250);
        assert_eq!(engine.interval(), Duration::from_millis(250));

        let engine = self::engine(&fs, "", &clock);
        assert_eq!(engine.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_empty_registry_is_internal() {
        let fs = MockFs::new();
        let clock = ManualClock::new(0);
        let err = fake_engine(&fs, "", &[], &clock).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_creation_failure_aborts() {
        let fs = MockFs::new();
        let clock = ManualClock::new(0);
        let registry = [
            ModuleDescriptor::new("counter", create_counting),
            ModuleDescriptor::new("broken", create_broken),
        ];
        let err = fake_engine(&fs, "", &registry, &clock).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Internal);

        // A disabled module is never created, so it cannot fail.
        let engine = fake_engine(&fs, "[module.broken]\nenabled = off\n", &registry, &clock);
        assert!(engine.is_ok());
    }

    #[test]
    fn test_creation_failure_releases_built_modules() {
        let fs = MockFs::new();
        let clock = ManualClock::new(0);
        let registry = [
            ModuleDescriptor::new("first", create_tracked),
            ModuleDescriptor::new("second", create_tracked),
            ModuleDescriptor::new("broken", create_broken),
            ModuleDescriptor::new("never", create_tracked),
        ];
        let err = fake_engine(&fs, "", &registry, &clock).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(TRACKED_CREATED.load(Ordering::SeqCst), 2);
        assert_eq!(TRACKED_LIVE.load(Ordering::SeqCst), 0);

        let engine = fake_engine(&fs, "[module.broken]\nenabled = 0\n", &registry, &clock).unwrap();
        assert_eq!(TRACKED_LIVE.load(Ordering::SeqCst), 3);
        drop(engine);
        assert_eq!(TRACKED_LIVE.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsupported_module_is_disabled() {
        let fs = MockFs::new();
        let clock = ManualClock::new(0);
        let registry = [
            ModuleDescriptor::new("gpu", create_unsupported),
            ModuleDescriptor::new("counter", create_counting),
        ];
        let mut engine = fake_engine(&fs, "", &registry, &clock).unwrap();

        let statuses: Vec<ModuleStatus> = engine.modules().collect();
        assert!(!statuses[0].enabled);
        assert!(statuses[1].enabled);
        assert_eq!(engine.poll().unwrap().len(), 2);
    }

    #[test]
    fn test_refresh_cadence() {
        let fs = MockFs::new();
        let clock = ManualClock::new(10_000);
        let registry = [ModuleDescriptor::new("counter", create_counting)];
        let mut engine =
            fake_engine(&fs, "[module.counter]\nrefresh_ms = 1000\n", &registry, &clock).unwrap();

        let refreshes = |engine: &mut Engine| {
            engine
                .poll()
                .unwrap()
                .find("counter.refreshes")
                .and_then(|m| m.value().as_u64())
                .unwrap()
        };

        assert_eq!(refreshes(&mut engine), 1);
        clock.advance(400);
        assert_eq!(refreshes(&mut engine), 1);
        clock.advance(599);
        assert_eq!(refreshes(&mut engine), 1);
        clock.advance(1);
        assert_eq!(refreshes(&mut engine), 2);
        clock.advance(5000);
        assert_eq!(refreshes(&mut engine), 3);

        let status = engine.modules().next().unwrap();
        assert_eq!(status.refresh_ms, 1000);
        assert_eq!(status.last_refresh_ms, Some(16_000));
    }

    #[test]
    fn test_zero_refresh_means_every_round() {
        let fs = MockFs::new();
        let clock = ManualClock::new(0);
        let registry = [ModuleDescriptor::new("counter", create_counting)];
        let mut engine = fake_engine(&fs, "", &registry, &clock).unwrap();

        for expected in 1..=3u64 {
            let snapshot = engine.poll().unwrap();
            assert_eq!(
                snapshot.find("counter.refreshes").unwrap().value().as_u64(),
                Some(expected)
            );
        }
    }

    #[test]
    fn test_cpu_cached_within_refresh_window() {
        let fs = MockFs::typical_laptop();
        let clock = ManualClock::new(0);
        let mut engine = engine(&fs, "[module.cpu]\nrefresh_ms = 2000\n", &clock);
        engine.poll().unwrap();

        clock.advance(2000);
        fs.set_cpu_times(1500, 9500);
        let fresh = engine.poll().unwrap();
        let usage = fresh.find("cpu.usage_percent").unwrap().clone();
        assert!((usage.value().as_f64().unwrap() - 50.0).abs() < 1e-9);

        clock.advance(500);
        fs.set_cpu_times(2500, 9500);
        let cached = engine.poll().unwrap();
        assert_eq!(cached.find("cpu.usage_percent"), Some(&usage));
    }

    #[test]
    fn test_transient_failure_is_isolated() {
        let fs = MockFs::new();
        let clock = ManualClock::new(0);
        let registry = [
            ModuleDescriptor::new("flaky", create_flaky),
            ModuleDescriptor::new("counter", create_counting),
        ];
        let mut engine = fake_engine(&fs, "", &registry, &clock).unwrap();

        fs.add_file("/fail", "");
        for round in 1..=4u64 {
            let snapshot = engine.poll().unwrap();
            assert!(snapshot.find("flaky.partial").is_none());
            let marker = snapshot.find("module.flaky.error").unwrap();
            assert!(marker.value().as_str().unwrap().contains("/fail"));
            assert_eq!(
                snapshot.find("counter.refreshes").unwrap().value().as_u64(),
                Some(round)
            );
            assert!(engine.last_error().unwrap().contains("/fail"));
            assert_eq!(engine.enabled_count(), 2);
            assert!(engine.modules().all(|m| m.enabled));
        }

        // The module stays enabled and recovers once the source is back.
        fs.remove_file("/fail");
        let snapshot = engine.poll().unwrap();
        assert!(snapshot.find("module.flaky.error").is_none());
        assert!(snapshot.find("flaky.done").is_some());
        assert_eq!(engine.enabled_count(), 2);
    }

    #[test]
    fn test_failed_refresh_is_retried_next_round() {
        let fs = MockFs::typical_laptop();
        let clock = ManualClock::new(0);
        let mut engine = engine(&fs, "[module.ram]\nrefresh_ms = 60000\n", &clock);
        engine.poll().unwrap();

        fs.remove_file("/proc/meminfo");
        clock.advance(60_000);
        let snapshot = engine.poll().unwrap();
        assert_eq!(names_with_prefix(&snapshot, "ram."), 0);
        assert!(snapshot.find("module.ram.error").is_some());
        assert!(snapshot.find("cpu.usage_percent").is_some());

        fs.set_meminfo(16384000, 4096000, 4096000);
        clock.advance(1);
        let snapshot = engine.poll().unwrap();
        assert_eq!(
            snapshot.find("ram.free_bytes").unwrap().value().as_u64(),
            Some(4096000 * 1024)
        );
    }

    #[test]
    fn test_out_of_memory_aborts_round() {
        let fs = MockFs::new();
        let clock = ManualClock::new(0);
        let registry = [
            ModuleDescriptor::new("counter", create_counting),
            ModuleDescriptor::new("oom", create_oom),
        ];
        let mut engine = fake_engine(&fs, "", &registry, &clock).unwrap();

        let err = engine.poll().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfMemory);
        assert!(engine.last_error().unwrap().contains("simulated"));
    }

    #[test]
    fn test_all_modules_share_round_time() {
        let fs = MockFs::new();
        let clock = ManualClock::new(777);
        let registry = [
            ModuleDescriptor::new("counter", create_counting),
            ModuleDescriptor::new("counter", create_counting),
        ];
        let mut engine = fake_engine(&fs, "", &registry, &clock).unwrap();
        let snapshot = engine.poll().unwrap();
        let times: Vec<u64> = snapshot
            .iter()
            .filter(|m| m.name() == "counter.now_ms")
            .filter_map(|m| m.value().as_u64())
            .collect();
        assert_eq!(times, vec![777, 777]);
    }
}
