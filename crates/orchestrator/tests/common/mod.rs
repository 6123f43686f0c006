//! Fakes shared by the orchestrator integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agents::{
    Agent, AgentRegistry, CacheBackend, CacheError, Context, GenerationError, MemoryCache,
    TextGenerator,
};
use async_trait::async_trait;
use notify::{ChannelError, Notifier, NotifyChannel, NotifyEvent};
use orchestrator::bootstrap::build_registry;
use orchestrator::{Config, Orchestrator};

pub const SEGMENT_REPLY: &str = r#"{"text": "Dawn breaks over the valley.", "options": [
    {"id": 1, "text": "Climb the ridge"},
    {"id": 2, "text": "Follow the river"},
    {"id": 3, "text": "Make camp"}
]}"#;

/// Generator that counts calls and answers with a fixed reply.
pub struct CountingGenerator {
    calls: AtomicUsize,
    reply: String,
    delay: Duration,
}

impl CountingGenerator {
    pub fn new(reply: &str) -> Arc<Self> {
        Self::with_delay(reply, Duration::ZERO)
    }

    pub fn with_delay(reply: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: reply.to_string(),
            delay,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for CountingGenerator {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self.reply.clone())
    }
}

/// Channel that records every alert message.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<String>>,
}

impl RecordingChannel {
    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotifyChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn enabled(&self) -> bool {
        true
    }

    async fn send(&self, event: &NotifyEvent) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(event.message());
        Ok(())
    }
}

/// Channel whose deliveries never complete.
pub struct StalledChannel;

#[async_trait]
impl NotifyChannel for StalledChannel {
    fn name(&self) -> &'static str {
        "stalled"
    }

    fn enabled(&self) -> bool {
        true
    }

    async fn send(&self, _event: &NotifyEvent) -> Result<(), ChannelError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Store that cannot be reached at all.
pub struct UnreachableStore;

#[async_trait]
impl CacheBackend for UnreachableStore {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Option<Duration>) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
}

/// Store that serves reads from `inner` but refuses every write.
#[derive(Default)]
pub struct ReadOnlyStore {
    pub inner: Arc<MemoryCache>,
}

#[async_trait]
impl CacheBackend for ReadOnlyStore {
    fn name(&self) -> &'static str {
        "read-only"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.inner.get(key).await
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Option<Duration>) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("replica is read-only".into()))
    }
}

/// Agent that sleeps before answering.
pub struct SlowAgent(pub Duration);

#[async_trait]
impl Agent for SlowAgent {
    fn id(&self) -> &'static str {
        "slow"
    }

    fn description(&self) -> &'static str {
        "sleeps"
    }

    fn capabilities(&self) -> &'static [&'static str] {
        &[]
    }

    async fn execute(&self, _context: &Context) -> agents::Result<Context> {
        tokio::time::sleep(self.0).await;
        Ok(Context::new())
    }
}

/// Agent that panics on every call.
pub struct PanickingAgent;

#[async_trait]
impl Agent for PanickingAgent {
    fn id(&self) -> &'static str {
        "panicky"
    }

    fn description(&self) -> &'static str {
        "always panics"
    }

    fn capabilities(&self) -> &'static [&'static str] {
        &[]
    }

    async fn execute(&self, _context: &Context) -> agents::Result<Context> {
        panic!("agent exploded");
    }
}

/// The production agents over an in-memory store, plus alert recording.
pub struct Harness {
    pub store: Arc<MemoryCache>,
    pub generator: Arc<CountingGenerator>,
    pub alerts: Arc<RecordingChannel>,
    pub orchestrator: Arc<Orchestrator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(default_config(), CountingGenerator::new(SEGMENT_REPLY))
    }

    pub fn with(config: Config, generator: Arc<CountingGenerator>) -> Self {
        let store = Arc::new(MemoryCache::new());
        let registry = build_registry(&config, store.clone(), generator.clone()).unwrap();
        let alerts = Arc::new(RecordingChannel::default());
        let orchestrator = Orchestrator::new(Arc::new(registry), recording_notifier(&alerts))
            .with_task_timeout(config.task_timeout);

        Self {
            store,
            generator,
            alerts,
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub fn backend(&self) -> Arc<dyn CacheBackend> {
        self.store.clone()
    }
}

/// Orchestrator over the production agents backed by `store`.
pub fn orchestrator_over(
    store: Arc<dyn CacheBackend>,
    alerts: &Arc<RecordingChannel>,
) -> Orchestrator {
    let registry = build_registry(
        &default_config(),
        store,
        CountingGenerator::new(SEGMENT_REPLY),
    )
    .unwrap();
    Orchestrator::new(Arc::new(registry), recording_notifier(alerts))
}

/// The production agents over a fresh in-memory store.
pub fn production_registry(config: &Config) -> Arc<AgentRegistry> {
    let registry = build_registry(
        config,
        Arc::new(MemoryCache::new()),
        CountingGenerator::new(SEGMENT_REPLY),
    )
    .unwrap();
    Arc::new(registry)
}

pub fn default_config() -> Config {
    Config::from_lookup(|_| None)
}

pub fn recording_notifier(channel: &Arc<RecordingChannel>) -> Arc<Notifier> {
    let channel: Arc<dyn NotifyChannel> = channel.clone();
    Arc::new(Notifier::with_channels(vec![channel]))
}

pub fn registry_of(agents: Vec<Arc<dyn Agent>>) -> Arc<AgentRegistry> {
    let registry = agents
        .into_iter()
        .fold(AgentRegistry::builder(), |builder, agent| builder.register(agent))
        .build()
        .unwrap();
    Arc::new(registry)
}

pub fn context(value: serde_json::Value) -> Context {
    value.as_object().cloned().unwrap()
}
