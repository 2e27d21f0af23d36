use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use huddle_core::config::PresenceConfig;
use huddle_core::event::PresenceUpdate;
use huddle_core::model::PresenceLevel;
use huddle_core::{Confirmation, Event, EventBus, EventPayload, Worker, wait_for};
use huddle_rest::{ServiceError, SettingsApi, UserSettings};
use xmpp_parsers::jid::{BareJid, Jid};

use crate::transport::PresenceTransport;

const SERVICE: &str = "presence";
const SUBSCRIPTION: &str = "{presence,settings}.*";
const PRESENCE_CHANGED: &str = "presence.changed";

type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Clone)]
pub struct PresenceDeps {
    pub transport: Arc<dyn PresenceTransport>,
    pub settings: Arc<dyn SettingsApi>,
    pub event_bus: Arc<dyn EventBus>,
}

/// Presence of the connected user as last echoed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedPresence {
    pub presence: PresenceLevel,
    pub status: String,
}

impl Default for ConnectedPresence {
    fn default() -> Self {
        let (_, status) = PresenceLevel::Online.to_show_status();
        Self {
            presence: PresenceLevel::Online,
            status: status.to_string(),
        }
    }
}

pub struct PresenceService {
    confirmation_timeout: Duration,
    deps: RwLock<Option<PresenceDeps>>,
    current: RwLock<ConnectedPresence>,
    worker: Mutex<Option<Worker>>,
}

impl Default for PresenceService {
    fn default() -> Self {
        Self::from_config(&PresenceConfig::default())
    }
}

impl PresenceService {
    /// `confirmation_timeout` bounds every wait for the server's echo.
    pub fn new(confirmation_timeout: Duration) -> Self {
        Self {
            confirmation_timeout,
            deps: RwLock::new(None),
            current: RwLock::new(ConnectedPresence::default()),
            worker: Mutex::new(None),
        }
    }

    pub fn from_config(config: &PresenceConfig) -> Self {
        Self::new(config.confirmation_timeout())
    }

    pub async fn start(self: &Arc<Self>, deps: PresenceDeps) -> Result<()> {
        let subscription = deps.event_bus.subscribe(SUBSCRIPTION)?;
        *self.deps.write().await = Some(deps);

        let service = Arc::downgrade(self);
        let worker = Worker::spawn(SERVICE, subscription, move |event| {
            let service = service.clone();
            async move {
                if let Some(service) = service.upgrade() {
                    service.handle_event(event).await;
                }
            }
        });
        if let Some(previous) = self.worker.lock().await.replace(worker) {
            previous.stop().await;
        }

        info!(timeout_ms = self.confirmation_timeout.as_millis() as u64, "presence service started");
        Ok(())
    }

    pub async fn stop(&self) {
        if let Some(worker) = self.worker.lock().await.take() {
            worker.stop().await;
        }
        self.deps.write().await.take();
        *self.current.write().await = ConnectedPresence::default();
        info!("presence service stopped");
    }

    pub async fn is_started(&self) -> bool {
        self.deps.read().await.is_some()
    }

    async fn deps(&self) -> Result<PresenceDeps> {
        self.deps.read().await.clone().ok_or(ServiceError::NotStarted)
    }

    async fn handle_event(&self, event: Event) {
        match (event.name(), &event.payload) {
            (PRESENCE_CHANGED, EventPayload::PresenceChanged(update)) => {
                self.on_presence_changed(update).await;
            }
            ("settings.changed", _) => {
                if let Err(error) = self.send_presence_from_configuration().await {
                    error!(%error, "presence from settings not sent");
                }
            }
            _ => {}
        }
    }

    async fn on_presence_changed(&self, update: &PresenceUpdate) {
        let Ok(deps) = self.deps().await else {
            return;
        };
        if !is_own(update, &deps.transport.own_jid().to_bare()) {
            return;
        }
        debug!(presence = %update.presence, "own presence changed");
        *self.current.write().await = ConnectedPresence {
            presence: update.presence,
            status: update.status.clone(),
        };
    }

    /// Announce `online` after connecting.
    pub async fn send_initial_presence(&self) -> Result<Confirmation> {
        let deps = self.deps().await?;
        self.announce(&deps, PresenceLevel::Online).await
    }

    /// Change the user's presence and remember it in the user settings.
    /// `Offline` cannot be chosen; disconnect instead.
    pub async fn set_presence_to(&self, level: PresenceLevel) -> Result<Confirmation> {
        if level == PresenceLevel::Offline {
            error!(presence = %level, "bad request: presence level cannot be set");
            return Err(ServiceError::bad_request(format!(
                "set_presence_to: {level} cannot be set"
            )));
        }
        let deps = self.deps().await?;

        let mut subscription = deps.event_bus.subscribe(PRESENCE_CHANGED)?;
        let (show, status) = level.to_show_status();
        deps.transport.send_presence(show, status).await?;
        deps.settings
            .update_user_settings(&UserSettings {
                presence: Some(level.as_str().to_string()),
                ..UserSettings::default()
            })
            .await?;

        let confirmation = self.confirm(&deps, &mut subscription).await;
        info!(presence = %level, confirmed = confirmation.is_confirmed(), "presence set");
        Ok(confirmation)
    }

    pub async fn get_user_connected_presence(&self) -> ConnectedPresence {
        self.current.read().await.clone()
    }

    /// Announce the level stored in the user settings. Falls back to
    /// `online` when the settings cannot be read or hold no usable level.
    pub async fn send_presence_from_configuration(&self) -> Result<Confirmation> {
        let deps = self.deps().await?;

        let level = match deps.settings.get_user_settings().await {
            Ok(settings) => configured_level(settings.presence.as_deref()),
            Err(error) => {
                warn!(%error, "user settings unavailable, announcing online");
                PresenceLevel::Online
            }
        };
        self.announce(&deps, level).await
    }

    /// Join presence for the bubble at `room_jid`.
    pub async fn send_initial_bubble_presence(&self, room_jid: &str) -> Result<()> {
        if room_jid.is_empty() {
            error!("bad request: bubble jid is not defined");
            return Err(ServiceError::bad_request(
                "send_initial_bubble_presence: bubble jid is not defined",
            ));
        }
        let deps = self.deps().await?;
        deps.transport.send_initial_bubble_presence(room_jid).await
    }

    /// Send `level` and wait for the server to echo our own presence.
    async fn announce(&self, deps: &PresenceDeps, level: PresenceLevel) -> Result<Confirmation> {
        let mut subscription = deps.event_bus.subscribe(PRESENCE_CHANGED)?;
        let (show, status) = level.to_show_status();
        deps.transport.send_presence(show, status).await?;

        let confirmation = self.confirm(deps, &mut subscription).await;
        debug!(presence = %level, confirmed = confirmation.is_confirmed(), "presence announced");
        Ok(confirmation)
    }

    async fn confirm(
        &self,
        deps: &PresenceDeps,
        subscription: &mut huddle_core::EventSubscription,
    ) -> Confirmation {
        let own_jid = deps.transport.own_jid().to_bare();
        let confirmation = wait_for(subscription, self.confirmation_timeout, |event| {
            matches!(&event.payload, EventPayload::PresenceChanged(update) if is_own(update, &own_jid))
        })
        .await;
        if !confirmation.is_confirmed() {
            warn!(
                timeout_ms = self.confirmation_timeout.as_millis() as u64,
                "presence not confirmed in time"
            );
        }
        confirmation
    }
}

/// Compares normalised bare JIDs; an unparseable `jid` is never ours.
fn is_own(update: &PresenceUpdate, own_jid: &BareJid) -> bool {
    update
        .jid
        .parse::<Jid>()
        .is_ok_and(|jid| jid.to_bare() == *own_jid)
}

fn configured_level(presence: Option<&str>) -> PresenceLevel {
    match presence.map(str::parse::<PresenceLevel>) {
        Some(Ok(level)) if level != PresenceLevel::Offline => level,
        Some(_) => {
            warn!(presence, "unusable presence in user settings, announcing online");
            PresenceLevel::Online
        }
        None => PresenceLevel::Online,
    }
}
