//! In-memory doubles for the SDK boundary and the credential service.

use crate::error::{ChatError, ChatResult};
use crate::models::{ChannelSnapshot, UserProfile};
use crate::realtime::{qualify_cid, ChannelQuery, ChannelStateQuery, RealtimeClient, RealtimeEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

pub fn channel_fixture(
    id: &str,
    last_message_at: Option<DateTime<Utc>>,
    unread: u32,
) -> ChannelSnapshot {
    ChannelSnapshot {
        id: id.to_string(),
        cid: qualify_cid("messaging", id),
        channel_type: "messaging".to_string(),
        name: Some(id.to_string()),
        description: None,
        image_url: None,
        members: HashMap::new(),
        messages: vec![],
        unread_count: unread,
        last_message_at,
        created_by_id: None,
    }
}

#[derive(Default)]
struct MockClientState {
    connected_user: Option<String>,
    connect_calls: Vec<String>,
    disconnect_calls: u32,
    upsert_calls: u32,
    /// Server-side channel fixture; `query_channels` serves it sorted by
    /// last-message time descending the way the backend would.
    channels: Vec<ChannelSnapshot>,
    query_channels_calls: u32,
    query_channel_calls: u32,
    fail_connect: bool,
    fail_upsert: bool,
    fail_query_channels: bool,
    fail_query_channel: bool,
    connect_delay: Option<Duration>,
}

pub struct MockRealtimeClient {
    state: Mutex<MockClientState>,
    paused_tx: watch::Sender<bool>,
    events: broadcast::Sender<RealtimeEvent>,
}

impl MockRealtimeClient {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        let (paused_tx, _) = watch::channel(false);
        Self {
            state: Mutex::new(MockClientState::default()),
            paused_tx,
            events,
        }
    }

    pub fn add_channel(&self, channel: ChannelSnapshot) {
        self.state.lock().unwrap().channels.push(channel);
    }

    pub fn set_unread(&self, id: &str, unread: u32) {
        let mut state = self.state.lock().unwrap();
        if let Some(channel) = state.channels.iter_mut().find(|c| c.id == id) {
            channel.unread_count = unread;
        }
    }

    pub fn set_connected_user(&self, user_id: Option<&str>) {
        self.state.lock().unwrap().connected_user = user_id.map(str::to_string);
    }

    pub fn send_event(&self, event: RealtimeEvent) {
        let _ = self.events.send(event);
    }

    pub fn fail_connect(&self, fail: bool) {
        self.state.lock().unwrap().fail_connect = fail;
    }

    /// Makes `connect` suspend for `delay` before binding, so tests can
    /// interleave a teardown with an in-flight connect.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.state.lock().unwrap().connect_delay = Some(delay);
    }

    pub fn fail_upsert(&self, fail: bool) {
        self.state.lock().unwrap().fail_upsert = fail;
    }

    pub fn fail_query_channels(&self, fail: bool) {
        self.state.lock().unwrap().fail_query_channels = fail;
    }

    pub fn fail_query_channel(&self, fail: bool) {
        self.state.lock().unwrap().fail_query_channel = fail;
    }

    /// Blocks `query_channels` calls until unpaused, so tests can observe
    /// mid-fetch state.
    pub fn pause_query_channels(&self, paused: bool) {
        self.paused_tx.send_replace(paused);
    }

    pub fn connect_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().connect_calls.clone()
    }

    pub fn disconnect_calls(&self) -> u32 {
        self.state.lock().unwrap().disconnect_calls
    }

    pub fn upsert_calls(&self) -> u32 {
        self.state.lock().unwrap().upsert_calls
    }

    pub fn query_channels_calls(&self) -> u32 {
        self.state.lock().unwrap().query_channels_calls
    }

    pub fn query_channel_calls(&self) -> u32 {
        self.state.lock().unwrap().query_channel_calls
    }
}

#[async_trait]
impl RealtimeClient for MockRealtimeClient {
    async fn connect(&self, user: &UserProfile, _token: &str) -> ChatResult<()> {
        let delay = self.state.lock().unwrap().connect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.connect_calls.push(user.id.clone());
        if state.fail_connect {
            return Err(ChatError::Connect("mock connect failure".into()));
        }
        state.connected_user = Some(user.id.clone());
        Ok(())
    }

    async fn disconnect(&self) -> ChatResult<()> {
        let mut state = self.state.lock().unwrap();
        state.disconnect_calls += 1;
        state.connected_user = None;
        Ok(())
    }

    fn connected_user_id(&self) -> Option<String> {
        self.state.lock().unwrap().connected_user.clone()
    }

    async fn query_channels(&self, _query: ChannelQuery) -> ChatResult<Vec<ChannelSnapshot>> {
        let mut paused = self.paused_tx.subscribe();
        loop {
            if !*paused.borrow_and_update() {
                break;
            }
            if paused.changed().await.is_err() {
                break;
            }
        }

        let mut state = self.state.lock().unwrap();
        state.query_channels_calls += 1;
        if state.fail_query_channels {
            return Err(ChatError::Query("mock bulk query failure".into()));
        }
        let mut channels = state.channels.clone();
        channels.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(channels)
    }

    async fn query_channel(
        &self,
        _channel_type: &str,
        id: &str,
        _query: ChannelStateQuery,
    ) -> ChatResult<ChannelSnapshot> {
        let mut state = self.state.lock().unwrap();
        state.query_channel_calls += 1;
        if state.fail_query_channel {
            return Err(ChatError::Query("mock channel query failure".into()));
        }
        state
            .channels
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| ChatError::Query(format!("unknown channel {id}")))
    }

    async fn upsert_user(&self, _profile: &UserProfile) -> ChatResult<()> {
        let mut state = self.state.lock().unwrap();
        state.upsert_calls += 1;
        if state.fail_upsert {
            return Err(ChatError::Client("mock upsert failure".into()));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.events.subscribe()
    }
}

pub struct MockCredentialProvider {
    response: ChatResult<String>,
    delay: Option<Duration>,
    calls: AtomicU32,
}

impl MockCredentialProvider {
    pub fn always_ok(token: &str) -> Self {
        Self {
            response: Ok(token.to_string()),
            delay: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn always_not_provisioned() -> Self {
        Self {
            response: Err(ChatError::NotProvisioned),
            delay: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn always_err(error: ChatError) -> Self {
        Self {
            response: Err(error),
            delay: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl crate::services::token_client::CredentialProvider for MockCredentialProvider {
    async fn fetch_token(&self, _user_id: &str) -> ChatResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.response.clone()
    }
}
