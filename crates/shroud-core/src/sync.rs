use std::future::Future;

use shroud_storage::{ChangeCause, CookieChange, Subscription};
use tokio::sync::{mpsc, watch};

use crate::flags::Flag;
use crate::mirror::{MirrorSnapshot, SettingsMirror};
use crate::store::PreferenceStore;

/// Read side of the mirror. `borrow()` never blocks on I/O.
pub type MirrorHandle = watch::Receiver<MirrorSnapshot>;

/// One published flag value change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagTransition {
    pub flag: Flag,
    pub enabled: bool,
}

/// Owns the settings mirror and keeps it current from the store's change stream
pub struct SettingsSync {
    mirror: SettingsMirror,
    subscription: Option<Subscription>,
    publisher: watch::Sender<MirrorSnapshot>,
    transitions: Vec<mpsc::UnboundedSender<FlagTransition>>,
}

impl SettingsSync {
    /// Subscribe to the store, then load it.
    ///
    /// Subscribing first means a write racing the load is still seen afterwards.
    pub fn start(store: &dyn PreferenceStore) -> Self {
        let subscription = store.subscribe();
        let mut mirror = SettingsMirror::new();
        mirror.load(store);
        let (publisher, _) = watch::channel(mirror.snapshot());

        log::info!("Settings mirror started: {:?}", mirror.snapshot());

        Self {
            mirror,
            subscription: Some(subscription),
            publisher,
            transitions: Vec::new(),
        }
    }

    /// Every published value change, one message per flag flip and none merged.
    /// The stream ends when the sync service stops.
    pub fn transitions(&mut self) -> mpsc::UnboundedReceiver<FlagTransition> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.transitions.push(sender);
        receiver
    }

    /// New read handle onto the published snapshot
    #[must_use]
    pub fn handle(&self) -> MirrorHandle {
        self.publisher.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> MirrorSnapshot {
        self.mirror.snapshot()
    }

    /// Apply one change and publish the result.
    ///
    /// The removal half of an overwrite is applied but not published: the
    /// replacing insert is always delivered right after it, so readers go
    /// straight to the new value.
    pub fn apply(&mut self, change: &CookieChange) -> Option<Flag> {
        let flag = self.mirror.apply(change)?;
        log::debug!(
            "Cookie changed: {} = {} ({}{})",
            change.cookie.name,
            change.cookie.value,
            change.cause,
            if change.removed { ", removed" } else { "" }
        );
        if change.removed && change.cause == ChangeCause::Overwrite {
            return Some(flag);
        }

        let snapshot = self.mirror.snapshot();
        let previous = self.publisher.send_replace(snapshot);
        for (changed, enabled) in snapshot.iter() {
            if previous.get(changed) != enabled {
                let transition = FlagTransition {
                    flag: changed,
                    enabled,
                };
                self.transitions
                    .retain(|sender| sender.send(transition).is_ok());
            }
        }
        Some(flag)
    }

    /// Apply every change already delivered, without waiting. Returns how many touched a flag.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Some(change) = self.subscription.as_mut().and_then(Subscription::try_recv) {
            if self.apply(&change).is_some() {
                applied += 1;
            }
        }
        applied
    }

    /// Apply changes in delivery order until `shutdown` resolves or the store goes away,
    /// then unsubscribe. Returns the final snapshot.
    pub async fn run_until<F>(mut self, shutdown: F) -> MirrorSnapshot
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let Some(subscription) = self.subscription.as_mut() else {
                break;
            };

            let next = tokio::select! {
                () = &mut shutdown => {
                    log::info!("Settings sync shutting down");
                    break;
                }
                change = subscription.recv() => change,
            };

            match next {
                Some(change) => {
                    self.apply(&change);
                }
                None => {
                    log::info!("Cookie store closed its change stream");
                    break;
                }
            }
        }

        self.stop()
    }

    /// Unsubscribe and return the last snapshot
    pub fn stop(mut self) -> MirrorSnapshot {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.mirror.snapshot()
    }
}
