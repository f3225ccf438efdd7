//! A recording fake connector for lifecycle tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use keyward_clickhouse::{AdminConnection, ClickhouseDatabase, ConnString, Connector, PoolLimits};
use keyward_core::{ConfigMap, DriverError, InitializeRequest};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// Something the fake observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open(u64),
    Ping(u64),
    Start(u64, String),
    End(u64, String),
    Close(u64),
}

#[derive(Default)]
struct State {
    events: Mutex<Vec<Event>>,
    targets: Mutex<Vec<ConnString>>,
    limits: Mutex<Vec<PoolLimits>>,
    fail_on: Mutex<Option<(String, String)>>,
    stale: AtomicBool,
    ping_fails: AtomicBool,
    open_fails: AtomicBool,
    next_id: AtomicU64,
    delay_ms: AtomicU64,
}

/// Shared view of everything the fake connector and its handles did.
#[derive(Clone, Default)]
pub struct Recorder {
    state: Arc<State>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.events.lock().clone()
    }

    pub fn clear(&self) {
        self.state.events.lock().clear();
    }

    /// Statements that completed, in order.
    pub fn executed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::End(_, s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn opens(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Open(_)))
            .count()
    }

    pub fn last_target(&self) -> Option<ConnString> {
        self.state.targets.lock().last().cloned()
    }

    pub fn last_limits(&self) -> Option<PoolLimits> {
        self.state.limits.lock().last().copied()
    }

    /// Fail any statement containing `needle` with `message`.
    pub fn fail_on(&self, needle: &str, message: &str) {
        *self.state.fail_on.lock() = Some((needle.to_string(), message.to_string()));
    }

    /// Make the next probe of an existing handle fail once.
    pub fn go_stale(&self) {
        self.state.stale.store(true, Ordering::SeqCst);
    }

    /// Make every probe fail.
    pub fn fail_pings(&self, fail: bool) {
        self.state.ping_fails.store(fail, Ordering::SeqCst);
    }

    /// Make opening a handle fail.
    pub fn fail_opens(&self, fail: bool) {
        self.state.open_fails.store(fail, Ordering::SeqCst);
    }

    /// Sleep inside every execute, widening the window for interleaving.
    pub fn set_delay(&self, delay: Duration) {
        self.state
            .delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn push(&self, event: Event) {
        self.state.events.lock().push(event);
    }
}

pub struct FakeConnector {
    recorder: Recorder,
}

impl FakeConnector {
    pub fn new(recorder: Recorder) -> Self {
        Self { recorder }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Connection = FakeConnection;

    async fn open(
        &self,
        target: &ConnString,
        limits: &PoolLimits,
    ) -> Result<FakeConnection, DriverError> {
        if self.recorder.state.open_fails.load(Ordering::SeqCst) {
            return Err("connection refused".into());
        }
        let id = self.recorder.state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.recorder.state.targets.lock().push(target.clone());
        self.recorder.state.limits.lock().push(*limits);
        self.recorder.push(Event::Open(id));
        Ok(FakeConnection {
            id,
            recorder: self.recorder.clone(),
        })
    }
}

pub struct FakeConnection {
    id: u64,
    recorder: Recorder,
}

#[async_trait]
impl AdminConnection for FakeConnection {
    async fn ping(&self) -> Result<(), DriverError> {
        self.recorder.push(Event::Ping(self.id));
        let state = &self.recorder.state;
        if state.ping_fails.load(Ordering::SeqCst) || state.stale.swap(false, Ordering::SeqCst) {
            return Err("broken pipe".into());
        }
        Ok(())
    }

    async fn execute(&self, statement: &str) -> Result<(), DriverError> {
        self.recorder
            .push(Event::Start(self.id, statement.to_string()));

        let delay = self.recorder.state.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        } else {
            tokio::task::yield_now().await;
        }

        let failure = self
            .recorder
            .state
            .fail_on
            .lock()
            .as_ref()
            .filter(|(needle, _)| statement.contains(needle.as_str()))
            .map(|(_, message)| message.clone());
        if let Some(message) = failure {
            return Err(message.into());
        }

        self.recorder
            .push(Event::End(self.id, statement.to_string()));
        Ok(())
    }

    async fn close(self) -> Result<(), DriverError> {
        self.recorder.push(Event::Close(self.id));
        Ok(())
    }
}

/// A fresh plugin instance backed by the fake connector.
pub fn database() -> (ClickhouseDatabase<FakeConnector>, Recorder) {
    let recorder = Recorder::new();
    let db = ClickhouseDatabase::with_connector(
        FakeConnector::new(recorder.clone()),
        keyward_clickhouse::default_username_template(),
        "0.1.0",
    )
    .unwrap();
    (db, recorder)
}

pub fn config(value: Value) -> ConfigMap {
    match value {
        Value::Object(map) => map,
        _ => panic!("config must be an object"),
    }
}

pub fn basic_config() -> ConfigMap {
    config(json!({
        "host": "clickhouse.internal",
        "port": 9004,
        "username": "admin",
        "password": "hunter2-admin",
    }))
}

pub fn init_request(config: ConfigMap) -> InitializeRequest {
    InitializeRequest {
        config,
        verify_connection: false,
    }
}
