use crate::config::ChatConfig;
use crate::error::{ChatError, ChatResult};
use crate::models::UserProfile;
use crate::realtime::{RealtimeClient, RealtimeEvent};
use crate::services::channel_list::{ChannelListService, RefreshOptions};
use crate::services::token_client::CredentialProvider;
use resilience::{retry_fixed, RetryConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Lifecycle phase of the realtime session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Idle,
    AcquiringCredential,
    Connecting,
    Connected,
    Failed,
}

/// Consumer-facing session state, published through a watch channel.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub phase: ConnectionPhase,
    /// Identity the manager is driving toward.
    pub target_user_id: Option<String>,
    /// Identity actually bound to the client handle; lags `target_user_id`
    /// during a transition.
    pub active_client_user_id: Option<String>,
    pub retry_count: u32,
    pub listeners_attached: bool,
    /// Last provisioning/connect failure, for "can't connect" UI.
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    /// The client handle is connected and bound to the target identity.
    pub fn ready(&self) -> bool {
        self.phase == ConnectionPhase::Connected
            && self.target_user_id.is_some()
            && self.active_client_user_id == self.target_user_id
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            phase: ConnectionPhase::Idle,
            target_user_id: None,
            active_client_user_id: None,
            retry_count: 0,
            listeners_attached: false,
            last_error: None,
        }
    }
}

/// The single owned value representing attached realtime listeners.
///
/// Dropping it is the only way to unregister: the listener task is told to
/// shut down and aborted, so re-attachment is always preceded by detachment
/// and handlers can never stack up across reconnects.
struct ListenerSet {
    shutdown_tx: watch::Sender<()>,
    handle: JoinHandle<()>,
}

impl Drop for ListenerSet {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        self.handle.abort();
    }
}

struct SessionState {
    phase: ConnectionPhase,
    target: Option<UserProfile>,
    active_client_user_id: Option<String>,
    retry_count: u32,
    last_error: Option<String>,
    /// Session generation; bumped by every new connect flow and every
    /// teardown. Continuations re-check it after each await and discard
    /// their result when superseded.
    epoch: u64,
    /// A connect flow is currently running.
    in_flight: bool,
    listeners: Option<ListenerSet>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: ConnectionPhase::Idle,
            target: None,
            active_client_user_id: None,
            retry_count: 0,
            last_error: None,
            epoch: 0,
            in_flight: false,
            listeners: None,
        }
    }

    fn target_user_id(&self) -> Option<&str> {
        self.target.as_ref().map(|p| p.id.as_str())
    }
}

/// Owns the lifecycle of the realtime session for the authenticated identity:
/// credential acquisition with bounded retry, connect, reconnect on token
/// expiry, listener lifecycle, and teardown on logout or identity change.
///
/// Exactly one instance exists per process; it is the only component that
/// calls `connect`/`disconnect`/`subscribe` on the shared client handle.
pub struct ConnectionManager {
    /// Self-reference handed to spawned tasks so they never keep the manager
    /// alive on their own.
    weak: Weak<Self>,
    client: Arc<dyn RealtimeClient>,
    credentials: Arc<dyn CredentialProvider>,
    channel_list: Arc<ChannelListService>,
    config: ChatConfig,
    session: Mutex<SessionState>,
    tx: watch::Sender<SessionSnapshot>,
}

impl ConnectionManager {
    pub fn new(
        client: Arc<dyn RealtimeClient>,
        credentials: Arc<dyn CredentialProvider>,
        config: ChatConfig,
    ) -> Arc<Self> {
        let channel_list = Arc::new(ChannelListService::new(client.clone(), config.clone()));
        let (tx, _rx) = watch::channel(SessionSnapshot::default());
        Arc::new_cyclic(|weak| Self {
            weak: weak.clone(),
            client,
            credentials,
            channel_list,
            config,
            session: Mutex::new(SessionState::new()),
            tx,
        })
    }

    /// The shared client handle. Always non-null; usable for channel
    /// operations only once [`ready`](Self::ready) is true.
    pub fn client(&self) -> Arc<dyn RealtimeClient> {
        self.client.clone()
    }

    pub fn channel_list(&self) -> Arc<ChannelListService> {
        self.channel_list.clone()
    }

    pub fn ready(&self) -> bool {
        self.tx.borrow().ready()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    /// Drives the session toward `profile`'s identity.
    ///
    /// Idempotent for the identity already in flight or already connected; an
    /// identity change tears the previous session down first.
    pub async fn connect_user(&self, profile: UserProfile) -> ChatResult<()> {
        self.connect_flow(profile, false).await
    }

    /// Tears the session down: detaches listeners, clears the channel list,
    /// and disconnects the client handle.
    pub async fn disconnect_user(&self) -> ChatResult<()> {
        self.teardown().await
    }

    async fn connect_flow(&self, profile: UserProfile, force: bool) -> ChatResult<()> {
        let user_id = profile.id.clone();
        let my_epoch = {
            let mut session = self.session.lock().await;

            if session.in_flight && session.target_user_id() == Some(user_id.as_str()) {
                debug!(user_id = %user_id, "connect already in flight, ignoring");
                return Ok(());
            }
            if !force
                && session.phase == ConnectionPhase::Connected
                && session.active_client_user_id.as_deref() == Some(user_id.as_str())
                && session.target_user_id() == Some(user_id.as_str())
            {
                debug!(user_id = %user_id, "already connected, ignoring");
                return Ok(());
            }

            let identity_changed = session
                .target_user_id()
                .is_some_and(|current| current != user_id);

            session.epoch += 1;
            session.in_flight = true;
            session.phase = ConnectionPhase::AcquiringCredential;
            session.target = Some(profile.clone());
            session.active_client_user_id = None;
            session.retry_count = 0;
            session.last_error = None;
            let old_listeners = session.listeners.take();
            self.publish(&session);
            let epoch = session.epoch;
            drop(session);
            drop(old_listeners);

            if identity_changed {
                self.channel_list.reset().await;
                // Only disconnect a handle bound to somebody else; a handle
                // already bound to the new identity is about to be reused.
                if let Some(bound) = self.client.connected_user_id() {
                    if bound != user_id {
                        if let Err(e) = self.client.disconnect().await {
                            warn!(user_id = %bound, error = %e, "disconnect of previous session failed");
                        }
                    }
                }
            }
            epoch
        };

        // Short-circuit: the handle may already be connected as the target
        // (e.g. a remount after a tab switch). Skip credential acquisition
        // and connect, just re-attach listeners and sync the profile.
        if !force && self.client.connected_user_id().as_deref() == Some(user_id.as_str()) {
            let mut session = self.session.lock().await;
            if session.epoch != my_epoch {
                debug!(user_id = %user_id, "connect flow superseded, discarding");
                return Ok(());
            }
            info!(user_id = %user_id, "client already connected, reusing session");
            self.finish_connect(&mut session, &profile);
            drop(session);
            self.spawn_post_connect(profile);
            return Ok(());
        }

        let token = match self.acquire_credential(&user_id, my_epoch).await {
            Ok(token) => token,
            Err(e) => {
                let mut session = self.session.lock().await;
                if session.epoch != my_epoch {
                    debug!(user_id = %user_id, "connect flow superseded, discarding");
                    return Ok(());
                }
                error!(user_id = %user_id, error = %e, "credential acquisition failed");
                session.phase = ConnectionPhase::Failed;
                session.retry_count = 0;
                session.in_flight = false;
                session.last_error = Some(e.to_string());
                self.publish(&session);
                return Err(e);
            }
        };

        {
            let mut session = self.session.lock().await;
            if session.epoch != my_epoch {
                debug!(user_id = %user_id, "connect flow superseded, discarding");
                return Ok(());
            }
            session.phase = ConnectionPhase::Connecting;
            self.publish(&session);
        }

        if self.client.connected_user_id().as_deref() != Some(user_id.as_str()) {
            if let Err(e) = self.client.connect(&profile, &token).await {
                let mut session = self.session.lock().await;
                if session.epoch != my_epoch {
                    debug!(user_id = %user_id, "connect flow superseded, discarding");
                    return Ok(());
                }
                error!(user_id = %user_id, error = %e, "connect failed");
                session.phase = ConnectionPhase::Failed;
                session.in_flight = false;
                session.last_error = Some(e.to_string());
                self.publish(&session);
                return Err(e);
            }
        }

        let mut session = self.session.lock().await;
        if session.epoch != my_epoch {
            debug!(user_id = %user_id, "connect flow superseded after connect, discarding");
            // The teardown that superseded us ran while `connect` was still
            // in flight and saw an unbound handle; the connection we just
            // established belongs to nobody and must come down here.
            let current_target = session.target_user_id().map(str::to_string);
            drop(session);
            if let Some(bound) = self.client.connected_user_id() {
                if current_target.as_deref() != Some(bound.as_str()) {
                    if let Err(e) = self.client.disconnect().await {
                        warn!(user_id = %bound, error = %e, "disconnect of superseded session failed");
                    }
                }
            }
            return Ok(());
        }
        info!(user_id = %user_id, "realtime session established");
        self.finish_connect(&mut session, &profile);
        drop(session);
        self.spawn_post_connect(profile);
        Ok(())
    }

    /// Fetches a connect token, retrying provisioning lag with a fixed delay.
    /// Each retry re-enters `AcquiringCredential` with a bumped retry count.
    async fn acquire_credential(&self, user_id: &str, my_epoch: u64) -> ChatResult<String> {
        let retry_config = RetryConfig {
            max_retries: self.config.max_token_retries,
            delay: self.config.token_retry_delay,
        };
        let attempts = AtomicU32::new(0);

        retry_fixed(retry_config, ChatError::is_retryable, || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                {
                    let mut session = self.session.lock().await;
                    // Teardown during a retry sleep must stop the loop: bail
                    // with a non-retryable error instead of fetching again.
                    if session.epoch != my_epoch {
                        return Err(ChatError::Client("connect flow superseded".into()));
                    }
                    if attempt > 0 {
                        session.phase = ConnectionPhase::AcquiringCredential;
                        session.retry_count = attempt;
                        self.publish(&session);
                    }
                }
                self.credentials.fetch_token(user_id).await
            }
        })
        .await
    }

    /// Marks the session connected and swaps in a fresh listener set. Must be
    /// called with the session lock held and the epoch verified.
    fn finish_connect(&self, session: &mut SessionState, profile: &UserProfile) {
        let old = session.listeners.replace(self.attach_listeners());
        drop(old);
        session.phase = ConnectionPhase::Connected;
        session.active_client_user_id = Some(profile.id.clone());
        session.retry_count = 0;
        session.in_flight = false;
        session.last_error = None;
        self.publish(session);
    }

    /// Best-effort work after readiness: profile upsert and the channel-list
    /// bootstrap. Neither blocks `ready`, and failures stay out of session
    /// state.
    fn spawn_post_connect(&self, profile: UserProfile) {
        let manager = self.weak.clone();
        tokio::spawn(async move {
            let Some(manager) = manager.upgrade() else {
                return;
            };
            if let Err(e) = manager.client.upsert_user(&profile).await {
                warn!(user_id = %profile.id, error = %e, "profile upsert failed");
            }
            if let Err(e) = manager.channel_list.ensure_bootstrapped(&profile.id).await {
                warn!(user_id = %profile.id, error = %e, "channel list bootstrap failed");
            }
        });
    }

    async fn teardown(&self) -> ChatResult<()> {
        let old_listeners = {
            let mut session = self.session.lock().await;
            session.epoch += 1;
            session.in_flight = false;
            session.phase = ConnectionPhase::Idle;
            session.target = None;
            session.active_client_user_id = None;
            session.retry_count = 0;
            session.last_error = None;
            let listeners = session.listeners.take();
            self.publish(&session);
            listeners
        };
        drop(old_listeners);

        self.channel_list.reset().await;

        if let Some(bound) = self.client.connected_user_id() {
            info!(user_id = %bound, "disconnecting realtime session");
            self.client.disconnect().await?;
        }
        Ok(())
    }

    fn attach_listeners(&self) -> ListenerSet {
        let events = self.client.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let manager = self.weak.clone();
        let handle = tokio::spawn(listener_loop(events, shutdown_rx, manager));
        ListenerSet {
            shutdown_tx,
            handle,
        }
    }

    async fn handle_event(&self, event: RealtimeEvent) {
        match &event {
            RealtimeEvent::ConnectionChanged { online } => {
                info!(online = online, "realtime connection state changed");
            }
            RealtimeEvent::ConnectionRecovered => {
                info!("realtime connection recovered");
            }
            RealtimeEvent::ClientError { code, message } => {
                error!(code = ?code, detail = %message, "realtime client error");
                if event.is_token_expired() {
                    self.schedule_reconnect().await;
                }
            }
            _ => self.channel_list.apply_event(&event).await,
        }
    }

    /// Schedules one bounded reconnect after a token-expiry signal: only when
    /// no connect is in flight and the expiring session still belongs to the
    /// current identity. The short delay keeps an immediately re-expiring
    /// token from looping tightly.
    async fn schedule_reconnect(&self) {
        let (profile, scheduled_epoch) = {
            let session = self.session.lock().await;
            if session.in_flight {
                debug!("token expired mid-connect, letting the running flow finish");
                return;
            }
            if session.active_client_user_id.as_deref() != session.target_user_id() {
                debug!("token expired for a superseded session, ignoring");
                return;
            }
            match session.target.clone() {
                Some(profile) => (profile, session.epoch),
                None => return,
            }
        };

        warn!(user_id = %profile.id, "connect token expired, scheduling reconnect");
        let delay = self.config.reconnect_delay;
        let manager = self.weak.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            let Some(manager) = manager.upgrade() else {
                return;
            };
            // A logout or a new login landing inside the delay bumps the
            // epoch; the stale timer must not re-establish the old session
            // on top of it.
            {
                let session = manager.session.lock().await;
                if session.epoch != scheduled_epoch
                    || session.target_user_id() != Some(profile.id.as_str())
                {
                    debug!(user_id = %profile.id, "reconnect superseded, discarding");
                    return;
                }
            }
            if let Err(e) = manager.connect_flow(profile.clone(), true).await {
                error!(user_id = %profile.id, error = %e, "reconnect after token expiry failed");
            }
        });
    }

    fn publish(&self, session: &SessionState) {
        self.tx.send_replace(SessionSnapshot {
            phase: session.phase,
            target_user_id: session.target.as_ref().map(|p| p.id.clone()),
            active_client_user_id: session.active_client_user_id.clone(),
            retry_count: session.retry_count,
            listeners_attached: session.listeners.is_some(),
            last_error: session.last_error.clone(),
        });
    }
}

async fn listener_loop(
    mut events: broadcast::Receiver<RealtimeEvent>,
    mut shutdown: watch::Receiver<()>,
    manager: Weak<ConnectionManager>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("realtime listeners detached");
                break;
            }
            received = events.recv() => {
                let Some(manager) = manager.upgrade() else { break };
                match received {
                    Ok(event) => manager.handle_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        // Missed deltas cannot be replayed; one silent reload
                        // reconverges the list instead of letting it drift.
                        warn!(skipped = skipped, "realtime event stream lagged, reloading channel list");
                        let _ = manager
                            .channel_list
                            .refresh(RefreshOptions { silent: true })
                            .await;
                    }
                    Err(RecvError::Closed) => {
                        debug!("realtime event stream closed");
                        break;
                    }
                }
            }
        }
    }
}
