use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use huddle_core::model::{Invitation, InvitationStatus};
use huddle_core::{Event, EventBus, EventPayload, EventSource, Worker};
use huddle_rest::{InvitationRequest, InvitationsApi, ServiceError};

use crate::contacts::{Contact, ContactInvitationState, Contacts};

const SERVICE: &str = "invitations";
const SUBSCRIPTION: &str = "{invitation,roster}.*";
const MAX_BULK_INVITATIONS: usize = 100;
/// Accepted invitations stay listed for one week after their last notification.
const ACCEPTED_RETENTION_HOURS: i64 = 168;
/// Backend detail code for "invitation already accepted".
const ALREADY_ACCEPTED: i64 = 409605;

type Result<T> = std::result::Result<T, ServiceError>;

/// Collaborators the service needs once started.
#[derive(Clone)]
pub struct InvitationsDeps {
    pub rest: Arc<dyn InvitationsApi>,
    pub contacts: Arc<dyn Contacts>,
    pub event_bus: Arc<dyn EventBus>,
}

#[derive(Default)]
struct InvitationsState {
    received: HashMap<String, Invitation>,
    sent: HashMap<String, Invitation>,
    received_list: Vec<Invitation>,
    accepted_list: Vec<Invitation>,
    sent_list: Vec<Invitation>,
}

impl InvitationsState {
    /// Rebuild the derived lists from the maps.
    fn refresh(&mut self) {
        let now = Utc::now();
        let retention = Duration::hours(ACCEPTED_RETENTION_HOURS);

        self.received_list = self
            .received
            .values()
            .filter(|invitation| invitation.status == InvitationStatus::Pending)
            .cloned()
            .collect();
        self.accepted_list = self
            .received
            .values()
            .filter(|invitation| invitation.status.is_accepted())
            .filter(|invitation| {
                invitation
                    .last_notification_date
                    .is_none_or(|date| now - date < retention)
            })
            .cloned()
            .collect();
        self.sent_list = self.sent.values().cloned().collect();

        sort_by_last_notification(&mut self.received_list);
        sort_by_last_notification(&mut self.accepted_list);
        sort_by_last_notification(&mut self.sent_list);
    }
}

/// Most recent first; invitations never notified go last.
fn sort_by_last_notification(invitations: &mut [Invitation]) {
    invitations.sort_by(|a, b| {
        b.last_notification_date
            .cmp(&a.last_notification_date)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Tracks the invitations the connected user received and sent, keeps the
/// matching contacts' subscription state in step, and republishes the
/// notable transitions on the event bus.
#[derive(Default)]
pub struct InvitationsService {
    deps: RwLock<Option<InvitationsDeps>>,
    state: RwLock<InvitationsState>,
    worker: Mutex<Option<Worker>>,
}

impl InvitationsService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store collaborators and start consuming invitation and roster events.
    pub async fn start(self: &Arc<Self>, deps: InvitationsDeps) -> Result<()> {
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

        info!("invitations service started");
        Ok(())
    }

    pub async fn stop(&self) {
        if let Some(worker) = self.worker.lock().await.take() {
            worker.stop().await;
        }
        self.deps.write().await.take();
        *self.state.write().await = InvitationsState::default();
        info!("invitations service stopped");
    }

    pub async fn is_started(&self) -> bool {
        self.deps.read().await.is_some()
    }

    async fn deps(&self) -> Result<InvitationsDeps> {
        self.deps.read().await.clone().ok_or(ServiceError::NotStarted)
    }

    async fn handle_event(&self, event: Event) {
        match (event.name(), &event.payload) {
            (
                "invitation.management_update",
                EventPayload::InvitationUpdate { id, kind, action },
            ) => {
                let Some(id) = id.as_deref() else {
                    warn!("invitation update without id ignored");
                    return;
                };
                let action = action.as_deref().unwrap_or_default();
                let result = match kind.as_deref() {
                    Some("received") => self.handle_received_invitation(id, action).await,
                    Some("sent") => self.handle_sent_invitation(id, action).await,
                    other => {
                        warn!(kind = ?other, "unexpected invitation update type");
                        Ok(())
                    }
                };
                if let Err(error) = result {
                    error!(invitation_id = id, %error, "invitation update failed");
                }
            }
            ("roster.changed", _) => {
                if let Err(error) = self.get_all_sent_invitations().await {
                    error!(%error, "sent invitations refresh failed");
                }
            }
            _ => {}
        }
    }

    /// Load sent, then received invitations.
    pub async fn init(&self) -> Result<()> {
        self.get_all_sent_invitations().await?;
        self.get_all_received_invitations().await?;
        Ok(())
    }

    /// Apply a backend notification about an invitation addressed to us.
    pub async fn handle_received_invitation(&self, id: &str, action: &str) -> Result<()> {
        debug!(invitation_id = id, action, "received invitation update");
        let deps = self.deps().await?;
        if action == "delete" {
            let mut state = self.state.write().await;
            state.received.remove(id);
            state.refresh();
            return Ok(());
        }

        let invitation = self.get_server_invitation(id).await?;
        if action == "create" {
            self.emit(&deps, "invitation.received", &invitation);
        }

        let contact_state = match invitation.status {
            InvitationStatus::Pending => {
                self.store_received(invitation.clone()).await;
                ContactInvitationState::Ask(Some(invitation.clone()))
            }
            InvitationStatus::Accepted | InvitationStatus::AutoAccepted => {
                self.store_received(invitation.clone()).await;
                if let Some(inviting) = invitation.inviting_user_id.as_deref() {
                    refresh_contact(deps.contacts.as_ref(), inviting).await;
                }
                ContactInvitationState::None
            }
            InvitationStatus::Canceled
            | InvitationStatus::Declined
            | InvitationStatus::Unknown => {
                self.state.write().await.received.remove(&invitation.id);
                ContactInvitationState::None
            }
        };

        if let Some(inviting) = invitation.inviting_user_id.as_deref() {
            self.apply_contact_state(&deps, inviting, contact_state).await;
        }
        self.state.write().await.refresh();
        Ok(())
    }

    /// Apply a backend notification about an invitation we sent.
    pub async fn handle_sent_invitation(&self, id: &str, action: &str) -> Result<()> {
        debug!(invitation_id = id, action, "sent invitation update");
        let deps = self.deps().await?;
        if action == "delete" {
            let mut state = self.state.write().await;
            state.sent.remove(id);
            state.refresh();
            return Ok(());
        }

        let invitation = self.get_server_invitation(id).await?;

        let contact_state = match invitation.status {
            InvitationStatus::Pending => {
                self.state
                    .write()
                    .await
                    .sent
                    .insert(invitation.id.clone(), invitation.clone());
                ContactInvitationState::Wait(Some(invitation.clone()))
            }
            InvitationStatus::Accepted | InvitationStatus::AutoAccepted => {
                self.state.write().await.sent.remove(&invitation.id);
                self.emit(&deps, "invitation.accepted", &invitation);
                if let Some(invited) = invitation.invited_user_id.as_deref() {
                    refresh_contact(deps.contacts.as_ref(), invited).await;
                }
                ContactInvitationState::None
            }
            InvitationStatus::Canceled => {
                self.state.write().await.sent.remove(&invitation.id);
                self.emit(&deps, "invitation.canceled", &invitation);
                ContactInvitationState::None
            }
            InvitationStatus::Declined | InvitationStatus::Unknown => {
                self.state.write().await.sent.remove(&invitation.id);
                ContactInvitationState::None
            }
        };

        if let Some(invited) = invitation.invited_user_id.as_deref() {
            self.apply_contact_state(&deps, invited, contact_state).await;
        }
        self.state.write().await.refresh();
        Ok(())
    }

    pub async fn get_received_invitations(&self) -> Vec<Invitation> {
        self.state.read().await.received_list.clone()
    }

    pub async fn get_accepted_invitations(&self) -> Vec<Invitation> {
        self.state.read().await.accepted_list.clone()
    }

    pub async fn get_sent_invitations(&self) -> Vec<Invitation> {
        self.state.read().await.sent_list.clone()
    }

    /// Number of invitations waiting for an answer from us.
    pub async fn get_invitations_number_for_counter(&self) -> usize {
        self.state.read().await.received_list.len()
    }

    pub async fn get_all_invitations_number(&self) -> usize {
        let state = self.state.read().await;
        state.received_list.len() + state.accepted_list.len() + state.sent_list.len()
    }

    /// Known invitation by id: received first, then accepted, then sent.
    pub async fn get_invitation(&self, id: &str) -> Option<Invitation> {
        let state = self.state.read().await;
        state
            .received
            .get(id)
            .or_else(|| state.accepted_list.iter().find(|invitation| invitation.id == id))
            .or_else(|| state.sent.get(id))
            .cloned()
    }

    pub async fn get_server_invitation(&self, id: &str) -> Result<Invitation> {
        require("get_server_invitation", "id", id)?;
        let deps = self.deps().await?;
        Ok(deps.rest.get_invitation(id).await?)
    }

    /// Ask `contact` to join our network.
    pub async fn join_contact_invitation(&self, contact: &Contact) -> Result<Value> {
        require("join_contact_invitation", "contact", &contact.id)?;
        let deps = self.deps().await?;

        let result = deps
            .rest
            .send_invitation(&InvitationRequest::JoinContact {
                invited_user_id: contact.id.clone(),
            })
            .await?;
        info!(contact_id = %contact.id, jid = ?contact.jid, "join invitation sent");
        if contact.status == "unknown" {
            self.apply_contact_state(&deps, &contact.id, ContactInvitationState::Wait(None))
                .await;
        }
        Ok(result)
    }

    pub async fn send_invitation_by_email(
        &self,
        email: &str,
        lang: Option<&str>,
        custom_message: Option<&str>,
    ) -> Result<Value> {
        require("send_invitation_by_email", "email", email)?;
        let deps = self.deps().await?;

        let request = InvitationRequest::ByEmail {
            email: email.to_string(),
            lang: lang.map(str::to_string),
            custom_message: custom_message.map(str::to_string),
        };
        Ok(deps.rest.send_invitation(&request).await?)
    }

    pub async fn cancel_one_send_invitation(&self, invitation: &Invitation) -> Result<Value> {
        require("cancel_one_send_invitation", "invitation", &invitation.id)?;
        let deps = self.deps().await?;
        Ok(deps.rest.cancel_invitation(&invitation.id).await?)
    }

    pub async fn re_send_invitation(&self, id: &str) -> Result<Value> {
        require("re_send_invitation", "id", id)?;
        let deps = self.deps().await?;
        Ok(deps.rest.re_send_invitation(id).await?)
    }

    /// Invite up to 100 addresses in one call.
    pub async fn send_invitations_par_bulk(&self, emails: &[String]) -> Result<Value> {
        if emails.is_empty() || emails.len() > MAX_BULK_INVITATIONS {
            error!(
                count = emails.len(),
                max = MAX_BULK_INVITATIONS,
                "bad request: bulk invitation size"
            );
            return Err(ServiceError::bad_request(format!(
                "send_invitations_par_bulk: between 1 and {MAX_BULK_INVITATIONS} emails expected, got {}",
                emails.len()
            )));
        }
        let deps = self.deps().await?;

        let request = InvitationRequest::Bulk {
            emails: emails.to_vec(),
        };
        Ok(deps.rest.send_invitation(&request).await?)
    }

    /// Accept a received invitation. When the backend reports it as already
    /// accepted, the inviting contact is refreshed before the error returns.
    pub async fn accept_invitation(&self, invitation: &Invitation) -> Result<Value> {
        require("accept_invitation", "invitation", &invitation.id)?;
        let deps = self.deps().await?;

        match deps.rest.accept_invitation(&invitation.id).await {
            Ok(result) => Ok(result),
            Err(error) => {
                if error.error_details_code() == Some(ALREADY_ACCEPTED) {
                    if let Some(inviting) = invitation.inviting_user_id.as_deref() {
                        refresh_contact(deps.contacts.as_ref(), inviting).await;
                    }
                }
                Err(error.into())
            }
        }
    }

    pub async fn decline_invitation(&self, invitation: &Invitation) -> Result<Value> {
        require("decline_invitation", "invitation", &invitation.id)?;
        let deps = self.deps().await?;
        Ok(deps.rest.decline_invitation(&invitation.id).await?)
    }

    /// Set a contact's roster fields from an invitation status: `ask`,
    /// `wait`, anything else clears the invitation.
    pub async fn update_contact_invitation_status(
        &self,
        contact_id: &str,
        status: &str,
        invitation: Option<Invitation>,
    ) -> Result<()> {
        require("update_contact_invitation_status", "contact_id", contact_id)?;
        let deps = self.deps().await?;
        deps.contacts
            .update_invitation_status(
                contact_id,
                ContactInvitationState::from_status(status, invitation),
            )
            .await
    }

    /// Reload received invitations: pending ones (registrations excluded)
    /// and accepted ones.
    pub async fn get_all_received_invitations(&self) -> Result<HashMap<String, Invitation>> {
        let deps = self.deps().await?;
        let invitations = deps.rest.get_received_invitations().await?;

        let mut received = HashMap::new();
        for invitation in invitations {
            if invitation.status == InvitationStatus::Pending && !invitation.is_registration() {
                if let Some(inviting) = invitation.inviting_user_id.as_deref() {
                    let contact_state = ContactInvitationState::Ask(Some(invitation.clone()));
                    self.apply_contact_state(&deps, inviting, contact_state).await;
                }
                received.insert(invitation.id.clone(), invitation);
            } else if invitation.status.is_accepted() {
                received.insert(invitation.id.clone(), invitation);
            }
        }

        let mut state = self.state.write().await;
        state.received = received.clone();
        state.refresh();
        debug!(count = received.len(), "received invitations loaded");
        Ok(received)
    }

    /// Reload sent invitations still pending, meeting invitations excluded.
    pub async fn get_all_sent_invitations(&self) -> Result<HashMap<String, Invitation>> {
        let deps = self.deps().await?;
        let invitations = deps.rest.get_sent_invitations().await?;

        let mut sent = HashMap::new();
        for invitation in invitations {
            if invitation.status != InvitationStatus::Pending || invitation.is_meeting_invite() {
                continue;
            }
            if let Some(invited) = invitation.invited_user_id.as_deref() {
                let contact_state = ContactInvitationState::Wait(Some(invitation.clone()));
                self.apply_contact_state(&deps, invited, contact_state).await;
            }
            sent.insert(invitation.id.clone(), invitation);
        }

        let mut state = self.state.write().await;
        state.sent = sent.clone();
        state.refresh();
        debug!(count = sent.len(), "sent invitations loaded");
        Ok(sent)
    }

    async fn store_received(&self, invitation: Invitation) {
        self.state
            .write()
            .await
            .received
            .insert(invitation.id.clone(), invitation);
    }

    /// Contact updates never fail the invitation flow.
    async fn apply_contact_state(
        &self,
        deps: &InvitationsDeps,
        contact_id: &str,
        state: ContactInvitationState,
    ) {
        if let Err(error) = deps
            .contacts
            .update_invitation_status(contact_id, state)
            .await
        {
            warn!(contact_id, %error, "contact invitation status not updated");
        }
    }

    fn emit(&self, deps: &InvitationsDeps, name: &str, invitation: &Invitation) {
        deps.event_bus.emit(
            name,
            EventSource::Service(SERVICE.to_string()),
            EventPayload::Invitation(invitation.clone()),
        );
    }
}

async fn refresh_contact(contacts: &dyn Contacts, contact_id: &str) {
    if let Err(error) = contacts.get_contact_by_db_id(contact_id, true).await {
        warn!(contact_id, %error, "contact refresh failed");
    }
}

fn require(operation: &'static str, field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        error!(operation, field, "bad request: missing parameter");
        return Err(ServiceError::bad_request(format!(
            "{operation}: {field} is required"
        )));
    }
    Ok(())
}
