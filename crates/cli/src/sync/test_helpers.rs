// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for sync module tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use serde_json::Value;
use tsq_core::{Action, ClockSource, Database, EntityType, OpKind, PendingOperation};

use super::connectivity::ManualConnectivity;
use super::engine::{EngineConfig, SyncEngine};
use super::remote::{Remote, RemoteError, RemoteFuture, RemoteResult};

/// Clock that only moves when told to.
pub struct MockClock {
    now: Mutex<DateTime<Utc>>,
}

impl MockClock {
    pub fn new() -> Self {
        MockClock {
            now: Mutex::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += TimeDelta::from_std(by).unwrap();
    }
}

impl ClockSource for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Scripted result for one mock call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Ok,
    Retryable(&'static str),
    Permanent(&'static str),
    Panic,
    /// Never completes; only the call timeout ends it.
    Hang,
}

type CallHook = Arc<dyn Fn(&PendingOperation) + Send + Sync>;

struct MockState {
    /// Outcomes consumed per entity ID, falling back to `default`.
    script: HashMap<String, VecDeque<Outcome>>,
    default: Outcome,
    calls: Vec<PendingOperation>,
    /// What the "server" currently holds, by entity ID.
    entities: HashMap<String, Value>,
}

/// In-memory remote recording every call and applying successful ones to
/// a fake server-side store.
pub struct MockRemote {
    state: Mutex<MockState>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    probe_ok: AtomicBool,
    hook: Mutex<Option<CallHook>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    /// Every call sleeps for `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        MockRemote {
            state: Mutex::new(MockState {
                script: HashMap::new(),
                default: Outcome::Ok,
                calls: Vec::new(),
                entities: HashMap::new(),
            }),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            probe_ok: AtomicBool::new(true),
            hook: Mutex::new(None),
        }
    }

    /// Queue outcomes for calls targeting `entity_id`.
    pub fn script(&self, entity_id: &str, outcomes: impl IntoIterator<Item = Outcome>) {
        self.state
            .lock()
            .unwrap()
            .script
            .entry(entity_id.to_string())
            .or_default()
            .extend(outcomes);
    }

    /// Outcome for calls with nothing scripted.
    pub fn set_default(&self, outcome: Outcome) {
        self.state.lock().unwrap().default = outcome;
    }

    /// Run `hook` at the start of every call.
    pub fn on_call(&self, hook: impl Fn(&PendingOperation) + Send + Sync + 'static) {
        *self.hook.lock().unwrap() = Some(Arc::new(hook));
    }

    pub fn set_probe(&self, ok: bool) {
        self.probe_ok.store(ok, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<PendingOperation> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    /// Entity IDs in call order.
    pub fn called_entities(&self) -> Vec<String> {
        self.calls().into_iter().map(|op| op.entity_id).collect()
    }

    pub fn entity(&self, entity_id: &str) -> Option<Value> {
        self.state.lock().unwrap().entities.get(entity_id).cloned()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn apply(&self, op: &PendingOperation) {
        let mut state = self.state.lock().unwrap();
        match op.kind.action {
            Action::Create => {
                state.entities.insert(op.entity_id.clone(), op.payload.clone());
            }
            Action::Update => {
                let entity = state
                    .entities
                    .entry(op.entity_id.clone())
                    .or_insert_with(|| Value::Object(Default::default()));
                if let (Value::Object(current), Value::Object(changes)) = (entity, &op.payload) {
                    for (k, v) in changes {
                        current.insert(k.clone(), v.clone());
                    }
                }
            }
            Action::Delete => {
                state.entities.remove(&op.entity_id);
            }
        }
    }
}

impl Remote for MockRemote {
    fn execute<'a>(&'a self, op: &'a PendingOperation) -> RemoteFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            let hook = self.hook.lock().unwrap().clone();
            if let Some(hook) = hook {
                hook(op);
            }

            let outcome = {
                let mut state = self.state.lock().unwrap();
                state.calls.push(op.clone());
                let scripted = state
                    .script
                    .get_mut(&op.entity_id)
                    .and_then(VecDeque::pop_front);
                scripted.unwrap_or_else(|| state.default.clone())
            };

            let n = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(n, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match outcome {
                Outcome::Ok => {
                    self.apply(op);
                    Ok(())
                }
                Outcome::Retryable(m) => Err(RemoteError::Retryable(m.to_string())),
                Outcome::Permanent(m) => Err(RemoteError::Permanent(m.to_string())),
                Outcome::Panic => panic!("mock remote exploded"),
                Outcome::Hang => {
                    std::future::pending::<()>().await;
                    Ok(())
                }
            }
        })
    }

    fn probe(&self) -> RemoteFuture<'_, bool> {
        Box::pin(async move { self.probe_ok.load(Ordering::SeqCst) })
    }
}

pub fn kind(action: Action) -> OpKind {
    OpKind::new(action, EntityType::Task)
}

/// Engine wired to mocks, with handles to drive them.
pub struct Harness {
    pub engine: SyncEngine,
    pub remote: Arc<MockRemote>,
    pub connectivity: Arc<ManualConnectivity>,
    pub clock: Arc<MockClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(Database::open_in_memory().unwrap(), MockRemote::new(), test_config())
    }

    pub fn with_remote(remote: MockRemote) -> Self {
        Self::with(Database::open_in_memory().unwrap(), remote, test_config())
    }

    pub fn with(db: Database, remote: MockRemote, config: EngineConfig) -> Self {
        let remote = Arc::new(remote);
        let connectivity = Arc::new(ManualConnectivity::new(true));
        let clock = Arc::new(MockClock::new());
        let engine = SyncEngine::new(
            db,
            remote.clone(),
            connectivity.clone(),
            clock.clone(),
            config,
        )
        .unwrap();
        Harness {
            engine,
            remote,
            connectivity,
            clock,
        }
    }

    pub fn enqueue(&self, action: Action, entity_id: &str, payload: Value) -> tsq_core::OpId {
        self.engine.enqueue(kind(action), entity_id, payload).unwrap()
    }
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        call_timeout: Duration::from_millis(200),
        ..EngineConfig::default()
    }
}
