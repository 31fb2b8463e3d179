use crate::config::ChatConfig;
use crate::error::{ChatError, ChatResult};
use crate::models::ChannelSnapshot;
use crate::realtime::{
    split_cid, ChannelQuery, ChannelStateQuery, RealtimeClient, RealtimeEvent,
    MESSAGING_CHANNEL_TYPE,
};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

/// Consumer-facing snapshot of the channel list.
#[derive(Debug, Clone, Default)]
pub struct ChannelListState {
    /// Most-recent-activity first, unique by channel identity.
    pub channels: Vec<ChannelSnapshot>,
    /// A user-visible load (bootstrap or non-silent refresh) is running.
    pub is_loading: bool,
    /// Any bulk load is running, silent ones included.
    pub is_fetching: bool,
    /// Last bulk-load failure; cleared by the next successful load.
    pub error: Option<String>,
}

impl ChannelListState {
    /// Aggregate unread count across all channels (tab badge).
    pub fn total_unread(&self) -> u32 {
        self.channels.iter().map(|c| c.unread_count).sum()
    }

    pub fn channel_by_cid(&self, cid: &str) -> Option<&ChannelSnapshot> {
        self.channels.iter().find(|c| c.matches_cid(cid))
    }
}

/// Options for an explicit list refresh.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshOptions {
    /// Suppress the user-facing loading indicator (`is_loading`); the fetch
    /// still reports through `is_fetching`.
    pub silent: bool,
}

#[derive(Default)]
struct ListInner {
    channels: Vec<ChannelSnapshot>,
    /// Identity the list was bootstrapped for; cleared on reset.
    bound_user_id: Option<String>,
    /// Guards against duplicate bulk loads from redundant triggers.
    has_bootstrapped: bool,
    error: Option<String>,
    is_loading: bool,
    is_fetching: bool,
}

/// Owns the ordered channel list for the bound identity and keeps it
/// consistent with realtime deltas.
///
/// Bulk loads replace the list wholesale; deltas patch it by channel
/// identity, always from a fresh single-channel query rather than the event
/// payload. Consumers only ever see immutable snapshots through the watch
/// channel.
pub struct ChannelListService {
    client: Arc<dyn RealtimeClient>,
    config: ChatConfig,
    inner: Mutex<ListInner>,
    tx: watch::Sender<ChannelListState>,
}

impl ChannelListService {
    pub fn new(client: Arc<dyn RealtimeClient>, config: ChatConfig) -> Self {
        let (tx, _rx) = watch::channel(ChannelListState::default());
        Self {
            client,
            config,
            inner: Mutex::new(ListInner::default()),
            tx,
        }
    }

    pub fn state(&self) -> ChannelListState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChannelListState> {
        self.tx.subscribe()
    }

    /// Runs the initial bulk load for `user_id`, at most once per
    /// (identity, connection). A failed bootstrap does not re-arm the guard;
    /// recovery is an explicit [`refresh`](Self::refresh) or a reset.
    pub async fn ensure_bootstrapped(&self, user_id: &str) -> ChatResult<()> {
        {
            let mut inner = self.inner.lock().await;
            if inner.has_bootstrapped {
                debug!(user_id = %user_id, "channel list already bootstrapped, skipping");
                return Ok(());
            }
            inner.has_bootstrapped = true;
            inner.bound_user_id = Some(user_id.to_string());
            inner.is_loading = true;
            inner.is_fetching = true;
            self.publish(&inner);
        }

        self.run_bulk_load(user_id).await
    }

    /// Explicit re-run of the bulk load (pull-to-refresh, structural events).
    pub async fn refresh(&self, options: RefreshOptions) -> ChatResult<()> {
        let user_id = {
            let mut inner = self.inner.lock().await;
            let Some(user_id) = inner.bound_user_id.clone() else {
                return Err(ChatError::NotConnected);
            };
            inner.is_loading = !options.silent;
            inner.is_fetching = true;
            self.publish(&inner);
            user_id
        };

        self.run_bulk_load(&user_id).await
    }

    async fn run_bulk_load(&self, user_id: &str) -> ChatResult<()> {
        let result = self
            .client
            .query_channels(ChannelQuery {
                member_user_id: user_id.to_string(),
                limit: self.config.channel_query_limit,
                watch: true,
                state: true,
            })
            .await;

        let mut inner = self.inner.lock().await;
        inner.is_loading = false;
        inner.is_fetching = false;
        match result {
            Ok(channels) => {
                debug!(user_id = %user_id, count = channels.len(), "channel list loaded");
                inner.channels = channels;
                inner.error = None;
                self.publish(&inner);
                Ok(())
            }
            Err(e) => {
                // Keep the stale list; a transient failure must not blank an
                // already-populated screen.
                warn!(user_id = %user_id, error = %e, "channel list load failed");
                inner.error = Some(e.to_string());
                self.publish(&inner);
                Err(e)
            }
        }
    }

    /// Applies one realtime delta to the list.
    ///
    /// Re-fetch failures are logged and the event dropped; a partial patch is
    /// worse than a missed one.
    pub async fn apply_event(&self, event: &RealtimeEvent) {
        match event {
            RealtimeEvent::MessageNew { cid } => {
                let Some(snapshot) = self.fetch_snapshot(cid).await else {
                    return;
                };
                let mut inner = self.inner.lock().await;
                move_to_front(&mut inner.channels, snapshot);
                self.publish(&inner);
            }
            RealtimeEvent::MarkRead { cid } => {
                let Some(snapshot) = self.fetch_snapshot(cid).await else {
                    return;
                };
                let mut inner = self.inner.lock().await;
                // In-place so the unread update does not perturb scroll
                // position; an absent channel cannot be placed correctly
                // from a read event alone.
                if replace_in_place(&mut inner.channels, snapshot) {
                    self.publish(&inner);
                }
            }
            RealtimeEvent::AddedToChannel { cid } => {
                // This event says nothing about ordering relative to the
                // existing channels; a full re-query is simpler and safer
                // than a local splice.
                debug!(cid = %cid, "added to channel, reloading list");
                let _ = self.refresh(RefreshOptions { silent: true }).await;
            }
            RealtimeEvent::ChannelDeleted { cid } => {
                let mut inner = self.inner.lock().await;
                if remove_channel(&mut inner.channels, cid) {
                    self.publish(&inner);
                }
            }
            _ => {}
        }
    }

    /// Clears the list and the bootstrap guard; the next login re-bootstraps
    /// instead of showing stale data.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        *inner = ListInner::default();
        self.publish(&inner);
    }

    /// One minimal round trip for a fresh snapshot of `cid`.
    async fn fetch_snapshot(&self, cid: &str) -> Option<ChannelSnapshot> {
        let (channel_type, id) = split_cid(cid).unwrap_or((MESSAGING_CHANNEL_TYPE, cid));
        match self
            .client
            .query_channel(
                channel_type,
                id,
                ChannelStateQuery {
                    message_limit: self.config.event_message_limit,
                    state: true,
                },
            )
            .await
        {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(cid = %cid, error = %e, "channel snapshot re-fetch failed, dropping event");
                None
            }
        }
    }

    fn publish(&self, inner: &ListInner) {
        self.tx.send_replace(ChannelListState {
            channels: inner.channels.clone(),
            is_loading: inner.is_loading,
            is_fetching: inner.is_fetching,
            error: inner.error.clone(),
        });
    }
}

/// Removes any entry for the snapshot's channel and reinserts it at the
/// front. Insertion at the front also covers a channel created by another
/// party just before its first message event arrives.
fn move_to_front(channels: &mut Vec<ChannelSnapshot>, snapshot: ChannelSnapshot) {
    channels.retain(|c| !c.matches_cid(&snapshot.cid));
    channels.insert(0, snapshot);
}

/// Replaces the matching entry without reordering. Returns false when the
/// channel is not in the list.
fn replace_in_place(channels: &mut [ChannelSnapshot], snapshot: ChannelSnapshot) -> bool {
    match channels.iter_mut().find(|c| c.matches_cid(&snapshot.cid)) {
        Some(entry) => {
            *entry = snapshot;
            true
        }
        None => false,
    }
}

/// Removes every entry matching `cid` (qualified or bare). Returns whether
/// anything was removed.
fn remove_channel(channels: &mut Vec<ChannelSnapshot>, cid: &str) -> bool {
    let bare = split_cid(cid).map(|(_, id)| id).unwrap_or(cid);
    let before = channels.len();
    channels.retain(|c| !(c.matches_cid(cid) || c.id == bare));
    channels.len() != before
}
