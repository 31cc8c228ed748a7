// Channel pool
//
// One live channel per pool key. The key map sits behind a short synchronous
// lock; every key owns an async slot lock held across open/close, so a slow
// open on one host never stalls another host while two callers on the same
// key can never both create a channel.

use crate::domain::{PoolKey, TargetDescriptor};
use crate::port::{
    ChannelConnector, ChannelError, CommandOutput, IdProvider, RemoteChannel, TimeProvider,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

/// A close that failed while a channel was being discarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFault {
    pub key: PoolKey,
    pub channel_id: String,
    pub error: ChannelError,
}

/// Channel handle owned by the pool
///
/// Callers share the handle; each `invoke` holds the inner lock for exactly
/// one invocation. Only the pool closes it.
pub struct PooledChannel {
    id: String,
    key: PoolKey,
    channel: AsyncMutex<Option<Box<dyn RemoteChannel>>>,
}

impl PooledChannel {
    fn new(id: String, key: PoolKey, channel: Box<dyn RemoteChannel>) -> Self {
        Self {
            id,
            key,
            channel: AsyncMutex::new(Some(channel)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    /// Run one command on the underlying channel
    ///
    /// # Errors
    /// - ChannelError::Closed if the pool discarded this channel meanwhile
    pub async fn invoke(&self, command: &str) -> Result<CommandOutput, ChannelError> {
        let mut guard = self.channel.lock().await;
        match guard.as_mut() {
            Some(channel) => channel.invoke(command).await,
            None => Err(ChannelError::Closed),
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.channel.lock().await.is_none()
    }

    /// Take the channel out and close it; a second call is a no-op
    async fn close(&self) -> Result<(), ChannelError> {
        let taken = self.channel.lock().await.take();
        match taken {
            Some(mut channel) => channel.close().await,
            None => Ok(()),
        }
    }
}

struct PoolEntry {
    channel: Arc<PooledChannel>,
    last_used_ms: i64,
}

type Slot = Arc<AsyncMutex<Option<PoolEntry>>>;

/// Keyed pool of open channels with idle expiry
pub struct ChannelPool {
    connector: Arc<dyn ChannelConnector>,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
    session_timeout: Duration,
    slots: Mutex<HashMap<PoolKey, Slot>>,
    diagnostics: Option<mpsc::UnboundedSender<CloseFault>>,
}

impl ChannelPool {
    /// Create an empty pool
    ///
    /// # Arguments
    /// * `connector` - Opens channels on demand
    /// * `time_provider` - Clock used for idle expiry
    /// * `id_provider` - Names each opened channel
    /// * `session_timeout` - Idle age after which a channel is recreated
    pub fn new(
        connector: Arc<dyn ChannelConnector>,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
        session_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            time_provider,
            id_provider,
            session_timeout,
            slots: Mutex::new(HashMap::new()),
            diagnostics: None,
        }
    }

    /// Report close faults on `sender` in addition to logging them
    pub fn with_diagnostics(mut self, sender: mpsc::UnboundedSender<CloseFault>) -> Self {
        self.diagnostics = Some(sender);
        self
    }

    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    /// Get the live channel for `target`, opening one if needed
    ///
    /// # Errors
    /// - ChannelError::Open if a new channel had to be opened and that failed
    pub async fn acquire(
        &self,
        target: &TargetDescriptor,
    ) -> Result<Arc<PooledChannel>, ChannelError> {
        let key = target.pool_key();
        let slot = self.slot(&key);
        let mut entry = slot.lock().await;

        let now = self.time_provider.now_millis();
        if let Some(current) = entry.as_mut() {
            if self.is_fresh(current.last_used_ms, now) {
                current.last_used_ms = now;
                debug!(key = %key, channel_id = %current.channel.id(), "Reusing pooled channel");
                return Ok(Arc::clone(&current.channel));
            }
        }

        if let Some(expired) = entry.take() {
            info!(
                key = %key,
                channel_id = %expired.channel.id(),
                idle_ms = %(now - expired.last_used_ms),
                "Pooled channel expired"
            );
            self.discard(&key, &expired.channel).await;
        }

        let channel = self.connector.open(target).await?;
        let pooled = Arc::new(PooledChannel::new(
            self.id_provider.generate_id(),
            key.clone(),
            channel,
        ));
        *entry = Some(PoolEntry {
            channel: Arc::clone(&pooled),
            last_used_ms: self.time_provider.now_millis(),
        });

        info!(key = %key, channel_id = %pooled.id(), host = %target.host, "Opened channel");
        Ok(pooled)
    }

    /// Close and remove the channel for `key`; absent keys are ignored
    pub async fn evict(&self, key: &PoolKey) {
        let slot = self.lock_slots().get(key).cloned();
        let Some(slot) = slot else {
            return;
        };

        let taken = slot.lock().await.take();
        if let Some(entry) = taken {
            info!(key = %key, channel_id = %entry.channel.id(), "Evicting channel");
            self.discard(key, &entry.channel).await;
        }
    }

    /// Evict every channel (shutdown)
    pub async fn evict_all(&self) {
        let keys: Vec<PoolKey> = self.lock_slots().keys().cloned().collect();
        for key in &keys {
            self.evict(key).await;
        }
        info!(keys = keys.len(), "Channel pool drained");
    }

    /// Evict channels idle for longer than the session timeout
    ///
    /// Returns the number of channels evicted.
    pub async fn evict_expired(&self) -> usize {
        let slots: Vec<(PoolKey, Slot)> = self
            .lock_slots()
            .iter()
            .map(|(k, s)| (k.clone(), Arc::clone(s)))
            .collect();

        let mut evicted = 0;
        for (key, slot) in slots {
            let mut entry = slot.lock().await;
            let now = self.time_provider.now_millis();
            let expired = matches!(entry.as_ref(), Some(e) if !self.is_fresh(e.last_used_ms, now));
            if !expired {
                continue;
            }
            if let Some(stale) = entry.take() {
                debug!(key = %key, channel_id = %stale.channel.id(), "Sweeping idle channel");
                self.discard(&key, &stale.channel).await;
                evicted += 1;
            }
        }
        evicted
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        let slots: Vec<Slot> = self.lock_slots().values().cloned().collect();
        let mut live = 0;
        for slot in slots {
            if slot.lock().await.is_some() {
                live += 1;
            }
        }
        live
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, key: &PoolKey) -> bool {
        let slot = self.lock_slots().get(key).cloned();
        match slot {
            Some(slot) => slot.lock().await.is_some(),
            None => false,
        }
    }

    fn is_fresh(&self, last_used_ms: i64, now_ms: i64) -> bool {
        let age_ms = now_ms.saturating_sub(last_used_ms);
        (age_ms as i128) < self.session_timeout.as_millis() as i128
    }

    fn slot(&self, key: &PoolKey) -> Slot {
        let mut slots = self.lock_slots();
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<PoolKey, Slot>> {
        // The map holds no invariant a panicking holder could break halfway
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Close a channel that is leaving the pool; close faults never block removal
    async fn discard(&self, key: &PoolKey, channel: &PooledChannel) {
        if let Err(error) = channel.close().await {
            warn!(
                key = %key,
                channel_id = %channel.id(),
                error = %error,
                "Failed to close channel (discarded anyway)"
            );
            if let Some(diagnostics) = &self.diagnostics {
                let _ = diagnostics.send(CloseFault {
                    key: key.clone(),
                    channel_id: channel.id().to_string(),
                    error,
                });
            }
        }
    }
}
