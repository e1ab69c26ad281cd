//! Call session manager
//!
//! Mediates one call at a time for the signed-in user: translates call
//! actions into record writes through the repository and publishes
//! [`CallEvent`]s to subscribers.

use crate::config::CallConfig;
use crate::domain::call::entity::{RemoteUser, UserProfile};
use crate::domain::call::event::CallEvent;
use crate::domain::call::record::{ActiveCallPointer, CallHistoryEntry, CallRecord, CallRecordPatch};
use crate::domain::call::repository::{fetch_profiles, CallRepository};
use crate::domain::call::ticker::DurationTicker;
use crate::domain::call::value_object::{CallStatus, SessionState};
use crate::domain::identity::IdentityProvider;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{CallId, UserId};
use crate::infrastructure::metrics::{
    CALLS_ANSWERED, CALLS_ENDED, CALLS_REJECTED, CALLS_STARTED, CALL_DURATION,
};
use metrics::{counter, histogram};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Tunables of a session manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSettings {
    pub tick_interval: Duration,
    pub event_capacity: usize,
}

impl Default for CallSettings {
    fn default() -> Self {
        Self::from(&CallConfig::default())
    }
}

impl From<&CallConfig> for CallSettings {
    fn from(config: &CallConfig) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            event_capacity: config.event_capacity.max(1),
        }
    }
}

/// The call the manager is handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentCall {
    pub id: CallId,
    pub remote_user: RemoteUser,
    pub state: SessionState,
}

/// History together with the profiles of everyone in it
#[derive(Debug, Clone, Default)]
pub struct HistoryView {
    /// Newest first
    pub entries: Vec<CallHistoryEntry>,
    pub profiles: HashMap<UserId, UserProfile>,
}

pub struct CallSessionManager {
    repository: Arc<dyn CallRepository>,
    identity: Arc<dyn IdentityProvider>,
    settings: CallSettings,
    events: broadcast::Sender<CallEvent>,
    ticker: DurationTicker,
    current_call: Option<CurrentCall>,
    muted: bool,
    speaker_on: bool,
}

impl CallSessionManager {
    pub fn new(
        repository: Arc<dyn CallRepository>,
        identity: Arc<dyn IdentityProvider>,
        settings: CallSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(settings.event_capacity);
        let ticker = DurationTicker::new(settings.tick_interval);
        Self {
            repository,
            identity,
            settings,
            events,
            ticker,
            current_call: None,
            muted: false,
            speaker_on: false,
        }
    }

    /// Register for status and duration events. Drop the receiver to
    /// unregister.
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.events.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn state(&self) -> SessionState {
        self.current_call
            .as_ref()
            .map(|call| call.state)
            .unwrap_or(SessionState::Idle)
    }

    pub fn current_call(&self) -> Option<&CurrentCall> {
        self.current_call.as_ref()
    }

    /// Talk time of the connected call so far
    pub fn elapsed_seconds(&self) -> u64 {
        self.ticker.elapsed()
    }

    /// Place a call to `remote_user`
    pub async fn make_call(&mut self, remote_user: RemoteUser) -> Result<CallId> {
        let me = self.require_user()?;
        if let Some(call) = &self.current_call {
            return Err(DomainError::InvalidStateTransition(format!(
                "cannot place a call while call {} is {}",
                call.id, call.state
            )));
        }

        let record = CallRecord::outgoing(me.clone(), remote_user.id.clone());
        let call_id = self.repository.create_call(&record).await?;

        let pointer = ActiveCallPointer {
            call_id: call_id.clone(),
            remote_user_id: remote_user.id.clone(),
            status: CallStatus::Outgoing,
        };
        if let Err(e) = self.repository.set_active_pointer(&me, &pointer).await {
            warn!(
                "Call {} was recorded but the active pointer for {} was not written: {}",
                call_id, me, e
            );
            return Err(e);
        }

        info!("Calling {} ({}), call {}", remote_user.name, remote_user.id, call_id);
        counter!(CALLS_STARTED).increment(1);

        self.current_call = Some(CurrentCall {
            id: call_id.clone(),
            remote_user,
            state: SessionState::Outgoing,
        });

        Ok(call_id)
    }

    /// Take over a call someone else placed to us. Purely local: how the call
    /// was discovered is up to the caller.
    pub fn receive_call(&mut self, call_id: CallId, remote_user: RemoteUser) -> Result<()> {
        self.require_user()?;
        if let Some(call) = &self.current_call {
            return Err(DomainError::InvalidStateTransition(format!(
                "cannot receive call {} while call {} is {}",
                call_id, call.id, call.state
            )));
        }

        info!("Incoming call {} from {}", call_id, remote_user.id);

        self.current_call = Some(CurrentCall {
            id: call_id,
            remote_user: remote_user.clone(),
            state: SessionState::Incoming,
        });
        self.publish(CallEvent::status_changed(
            SessionState::Incoming,
            Some(remote_user),
        ));

        Ok(())
    }

    /// Connect the current call and start counting talk time
    pub async fn answer_call(&mut self) -> Result<()> {
        let call = self.require_call("answer")?.clone();
        if !call.state.can_transition_to(SessionState::Connected) {
            return Err(DomainError::InvalidStateTransition(format!(
                "call {} is already {}",
                call.id, call.state
            )));
        }
        let me = self.require_user()?;

        self.repository
            .update_call(&call.id, &CallRecordPatch::connected())
            .await?;

        let pointer = ActiveCallPointer {
            call_id: call.id.clone(),
            remote_user_id: call.remote_user.id.clone(),
            status: CallStatus::Connected,
        };
        if let Err(e) = self.repository.set_active_pointer(&me, &pointer).await {
            warn!(
                "Call {} marked connected but the active pointer for {} was not updated: {}",
                call.id, me, e
            );
            return Err(e);
        }

        self.ticker.start(self.events.clone());
        if let Some(current) = self.current_call.as_mut() {
            current.state = SessionState::Connected;
        }

        info!("Call {} connected", call.id);
        counter!(CALLS_ANSWERED).increment(1);

        self.publish(CallEvent::status_changed(
            SessionState::Connected,
            Some(call.remote_user),
        ));
        Ok(())
    }

    /// Decline an incoming call
    pub async fn reject_call(&mut self) -> Result<()> {
        let call = self.require_call("reject")?.clone();
        if call.state != SessionState::Incoming {
            return Err(DomainError::InvalidStateTransition(format!(
                "only incoming calls can be rejected, call {} is {}",
                call.id, call.state
            )));
        }
        let me = self.require_user()?;

        self.repository
            .update_call(&call.id, &CallRecordPatch::rejected())
            .await?;
        self.terminate(&me, &call, CallStatus::Rejected, 0).await?;

        info!("Call {} rejected", call.id);
        counter!(CALLS_REJECTED).increment(1);

        self.finish();
        Ok(())
    }

    /// Hang up an outgoing or connected call
    pub async fn end_call(&mut self) -> Result<()> {
        let call = self.require_call("end")?.clone();
        if !matches!(call.state, SessionState::Outgoing | SessionState::Connected) {
            return Err(DomainError::InvalidStateTransition(format!(
                "call {} is {}, reject it instead",
                call.id, call.state
            )));
        }
        let me = self.require_user()?;

        // Freeze talk time before any write so the stored duration is the
        // last count subscribers saw
        let talking = call.state == SessionState::Connected;
        let duration = if talking { self.ticker.stop() } else { 0 };

        if let Err(e) = self.record_end(&me, &call, duration).await {
            if talking {
                self.ticker.resume(self.events.clone(), duration);
            }
            return Err(e);
        }

        info!("Call {} ended after {}s", call.id, duration);
        counter!(CALLS_ENDED).increment(1);
        histogram!(CALL_DURATION).record(duration as f64);

        self.finish();
        Ok(())
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    pub fn toggle_speaker(&mut self) -> bool {
        self.speaker_on = !self.speaker_on;
        self.speaker_on
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_speaker_on(&self) -> bool {
        self.speaker_on
    }

    /// Stop the ticker, close every subscription and forget the current call.
    /// Existing receivers see the channel closed as soon as this returns.
    /// Leaves the manager as if freshly constructed; safe to call repeatedly.
    pub fn cleanup(&mut self) {
        self.ticker.reset();
        // Replacing the sender closes all existing receivers
        let (events, _) = broadcast::channel(self.settings.event_capacity);
        self.events = events;
        if let Some(call) = self.current_call.take() {
            debug!("Cleanup dropped call {} in state {}", call.id, call.state);
        }
        self.muted = false;
        self.speaker_on = false;
    }

    /// The signed-in user's call history, newest first
    pub async fn call_history(&self) -> Result<Vec<CallHistoryEntry>> {
        let me = self.require_user()?;
        self.repository.get_history(&me).await
    }

    /// History plus the profiles of all remote parties, fetched concurrently
    pub async fn call_history_with_profiles(&self) -> Result<HistoryView> {
        let entries = self.call_history().await?;
        let users: Vec<UserId> = entries.iter().map(|e| e.remote_user_id.clone()).collect();
        let profiles = fetch_profiles(self.repository.as_ref(), &users).await;
        Ok(HistoryView { entries, profiles })
    }

    pub async fn user_profile(&self, user: &UserId) -> Result<Option<UserProfile>> {
        self.repository.get_user_profile(user).await
    }

    /// Whether `user` currently has an active-call pointer
    pub async fn is_user_in_call(&self, user: &UserId) -> Result<bool> {
        Ok(self.repository.get_active_pointer(user).await?.is_some())
    }

    fn require_user(&self) -> Result<UserId> {
        self.identity
            .current_user()
            .ok_or(DomainError::NotAuthenticated)
    }

    fn require_call(&self, action: &'static str) -> Result<&CurrentCall> {
        self.current_call
            .as_ref()
            .ok_or(DomainError::NoActiveCall(action))
    }

    async fn record_end(&self, me: &UserId, call: &CurrentCall, duration: u64) -> Result<()> {
        self.repository
            .update_call(&call.id, &CallRecordPatch::ended(duration))
            .await?;
        self.terminate(me, call, CallStatus::Ended, duration).await
    }

    /// Durable side of a terminal transition: drop the pointer, log history
    async fn terminate(
        &self,
        me: &UserId,
        call: &CurrentCall,
        status: CallStatus,
        duration: u64,
    ) -> Result<()> {
        if let Err(e) = self.repository.clear_active_pointer(me).await {
            warn!(
                "Call {} is {} but the active pointer for {} was not cleared: {}",
                call.id, status, me, e
            );
            return Err(e);
        }

        match self.repository.get_call(&call.id).await? {
            Some(record) => {
                let entry =
                    CallHistoryEntry::from_record(call.id.clone(), &record, me, status, duration);
                self.repository.append_history(me, &entry).await?;
            }
            None => warn!("Call {} has no record, not adding it to history", call.id),
        }

        Ok(())
    }

    /// Local side of a terminal transition
    fn finish(&mut self) {
        self.current_call = None;
        self.ticker.reset();
        self.publish(CallEvent::status_changed(SessionState::Idle, None));
    }

    fn publish(&self, event: CallEvent) {
        if self.events.send(event).is_err() {
            debug!("No subscribers for call event");
        }
    }
}
