//! Teleport: Labelled Signal Routing
//!
//! A [`TeleportIn`] module publishes its inputs under a text label; any
//! number of [`TeleportOut`] modules look the label up every sample and
//! reproduce those signals without a cable between them.
//!
//! The [`SignalRegistry`] holding the label table is an explicitly owned,
//! shareable object tied to the host session. It keeps only weak references
//! to producers, so a dropped producer can never be resolved.

use crate::port::{GraphModule, PortDef, PortInput, PortSpec, PortValues, SignalKind};
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// Number of signals carried by one teleport
pub const TELEPORT_CHANNELS: usize = 8;

/// Length of generated labels
pub const LABEL_LENGTH: usize = 4;

/// Random draws per label length before a longer label is tried
const LABEL_ATTEMPTS: usize = 64;

/// Atomic f64 for lock-free communication between threads
///
/// Uses AtomicU64 internally since there's no native AtomicF64.
#[derive(Debug, Default)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
struct Channel {
    value: AtomicF64,
    active: AtomicBool,
}

/// Signals published by one producer
///
/// Written by the producer's tick and read by consumers, possibly from
/// another thread. Each channel is updated atomically on its own; no
/// ordering between channels is guaranteed.
#[derive(Debug, Default)]
pub struct TeleportSource {
    channels: [Channel; TELEPORT_CHANNELS],
}

impl TeleportSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish one channel. Out-of-range channels are ignored.
    pub fn write(&self, channel: usize, input: PortInput) {
        if let Some(ch) = self.channels.get(channel) {
            ch.value.set(input.value);
            ch.active.store(input.active, Ordering::Relaxed);
        }
    }

    /// Read one channel. Out-of-range channels read as unpatched.
    pub fn read(&self, channel: usize) -> PortInput {
        match self.channels.get(channel) {
            Some(ch) => PortInput {
                value: ch.value.get(),
                active: ch.active.load(Ordering::Relaxed),
            },
            None => PortInput::inactive(),
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    sources: BTreeMap<String, Weak<TeleportSource>>,
    last_inserted: Option<String>,
}

/// Label table shared by all teleport modules of one session
///
/// Labels are compared by exact value. At most one producer holds a label;
/// registering an existing label silently takes it over.
#[derive(Debug, Default)]
pub struct SignalRegistry {
    state: RwLock<RegistryState>,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // The table is never left half-updated, so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind `label` to `source`, replacing any previous producer
    pub fn register(&self, label: &str, source: &Arc<TeleportSource>) {
        let mut state = self.write();
        let previous = state
            .sources
            .insert(label.to_owned(), Arc::downgrade(source));
        state.last_inserted = Some(label.to_owned());

        let taken_over = previous
            .and_then(|p| p.upgrade())
            .is_some_and(|p| !Arc::ptr_eq(&p, source));
        log_registered(label, taken_over);
    }

    /// Bind `source` to a freshly generated label that is not in use
    ///
    /// The check and the insertion happen under one lock, so two producers
    /// can never be handed the same label.
    pub fn register_unique(&self, source: &Arc<TeleportSource>) -> String {
        let mut rng = rand::thread_rng();
        let mut state = self.write();
        let label = unused_label(&mut rng, |candidate| state.sources.contains_key(candidate));
        state.sources.insert(label.clone(), Arc::downgrade(source));
        state.last_inserted = Some(label.clone());

        log_registered(&label, false);
        label
    }

    /// Remove every label currently bound to `source`
    ///
    /// Returns whether anything was removed. A label taken over by another
    /// producer is left alone.
    pub fn unregister(&self, source: &Arc<TeleportSource>) -> bool {
        let target = Arc::downgrade(source);
        let mut state = self.write();
        let before = state.sources.len();
        state.sources.retain(|_, weak| !Weak::ptr_eq(weak, &target));
        let removed = before - state.sources.len();
        log_unregistered(removed);
        removed > 0
    }

    /// Whether `label` is bound to a live producer
    pub fn exists(&self, label: &str) -> bool {
        self.read()
            .sources
            .get(label)
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// The producer currently bound to `label`
    pub fn resolve(&self, label: &str) -> Option<Arc<TeleportSource>> {
        self.read().sources.get(label).and_then(Weak::upgrade)
    }

    /// Most recently registered label, used as default for new consumers
    pub fn last_inserted(&self) -> Option<String> {
        self.read().last_inserted.clone()
    }

    /// All labels bound to live producers, sorted
    pub fn labels(&self) -> Vec<String> {
        self.read()
            .sources
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .map(|(label, _)| label.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read()
            .sources
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(feature = "defmt")]
fn log_registered(label: &str, taken_over: bool) {
    if taken_over {
        defmt::debug!("teleport: label {=str} taken over", label);
    } else {
        defmt::debug!("teleport: registered {=str}", label);
    }
}

#[cfg(not(feature = "defmt"))]
fn log_registered(_label: &str, _taken_over: bool) {}

#[cfg(feature = "defmt")]
fn log_unregistered(count: usize) {
    if count > 0 {
        defmt::debug!("teleport: unregistered {=usize} label(s)", count);
    }
}

#[cfg(not(feature = "defmt"))]
fn log_unregistered(_count: usize) {}

fn random_label(rng: &mut impl Rng, length: usize) -> String {
    (0..length)
        .map(|_| char::from(rng.gen_range(b'A'..=b'Z')))
        .collect()
}

/// Draw labels until one is free, growing the length when a size is crowded
fn unused_label(rng: &mut impl Rng, is_taken: impl Fn(&str) -> bool) -> String {
    let mut length = LABEL_LENGTH;
    loop {
        for _ in 0..LABEL_ATTEMPTS {
            let candidate = random_label(rng, length);
            if !is_taken(&candidate) {
                return candidate;
            }
        }
        length += 1;
    }
}

/// Teleport producer
///
/// Inputs `in1`..`in8` are published under the module's label. The label is
/// registered on construction and released when the module is dropped.
pub struct TeleportIn {
    registry: Arc<SignalRegistry>,
    source: Arc<TeleportSource>,
    label: String,
    spec: PortSpec,
}

impl TeleportIn {
    /// Create a producer with a generated unique label
    pub fn new(registry: Arc<SignalRegistry>) -> Self {
        let source = Arc::new(TeleportSource::new());
        let label = registry.register_unique(&source);
        Self::from_parts(registry, source, label)
    }

    /// Create a producer under `label`, taking it over if already in use
    pub fn with_label(registry: Arc<SignalRegistry>, label: impl Into<String>) -> Self {
        let source = Arc::new(TeleportSource::new());
        let label = label.into();
        registry.register(&label, &source);
        Self::from_parts(registry, source, label)
    }

    fn from_parts(registry: Arc<SignalRegistry>, source: Arc<TeleportSource>, label: String) -> Self {
        let inputs = (0..TELEPORT_CHANNELS)
            .map(|i| PortDef::new(i as u32, format!("in{}", i + 1), SignalKind::Cv))
            .collect();
        Self {
            registry,
            source,
            label,
            spec: PortSpec {
                inputs,
                outputs: vec![],
            },
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Move this producer to a new label
    pub fn set_label(&mut self, label: impl Into<String>) {
        let label = label.into();
        if label == self.label {
            return;
        }
        self.registry.unregister(&self.source);
        self.registry.register(&label, &self.source);
        self.label = label;
    }

    pub fn source(&self) -> &Arc<TeleportSource> {
        &self.source
    }
}

impl Drop for TeleportIn {
    fn drop(&mut self) {
        self.registry.unregister(&self.source);
    }
}

impl GraphModule for TeleportIn {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues, _outputs: &mut PortValues) {
        for channel in 0..TELEPORT_CHANNELS {
            self.source.write(channel, inputs.input(channel as u32));
        }
    }

    fn reset(&mut self) {
        for channel in 0..TELEPORT_CHANNELS {
            self.source.write(channel, PortInput::inactive());
        }
    }

    fn set_sample_rate(&mut self, _: f64) {}

    fn type_id(&self) -> &'static str {
        "teleport_in"
    }
}

const OUTPUT_BASE: u32 = 10;

/// Teleport consumer
///
/// Outputs `out1`..`out8` reproduce the inputs of whichever producer holds
/// the selected label, or 0V when no producer does.
pub struct TeleportOut {
    registry: Arc<SignalRegistry>,
    label: String,
    status: [bool; TELEPORT_CHANNELS],
    source_exists: bool,
    spec: PortSpec,
}

impl TeleportOut {
    /// Create a consumer following the most recently registered label
    pub fn new(registry: Arc<SignalRegistry>) -> Self {
        let label = registry.last_inserted().unwrap_or_default();
        Self::with_label(registry, label)
    }

    pub fn with_label(registry: Arc<SignalRegistry>, label: impl Into<String>) -> Self {
        let outputs = (0..TELEPORT_CHANNELS)
            .map(|i| PortDef::new(OUTPUT_BASE + i as u32, format!("out{}", i + 1), SignalKind::Cv))
            .collect();
        Self {
            registry,
            label: label.into(),
            status: [false; TELEPORT_CHANNELS],
            source_exists: false,
            spec: PortSpec {
                inputs: vec![],
                outputs,
            },
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// Whether the label resolved on the last tick
    pub fn source_exists(&self) -> bool {
        self.source_exists
    }

    /// Whether the producer's input for `channel` was patched on the last tick
    pub fn channel_active(&self, channel: usize) -> bool {
        self.status.get(channel).copied().unwrap_or(false)
    }
}

impl GraphModule for TeleportOut {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, _inputs: &PortValues, outputs: &mut PortValues) {
        let source = self.registry.resolve(&self.label);
        self.source_exists = source.is_some();

        for channel in 0..TELEPORT_CHANNELS {
            let input = source
                .as_ref()
                .map(|s| s.read(channel))
                .unwrap_or_default();
            self.status[channel] = input.active;
            outputs.set(OUTPUT_BASE + channel as u32, input.value);
        }
    }

    fn reset(&mut self) {
        self.status = [false; TELEPORT_CHANNELS];
        self.source_exists = false;
    }

    fn set_sample_rate(&mut self, _: f64) {}

    fn type_id(&self) -> &'static str {
        "teleport_out"
    }
}
