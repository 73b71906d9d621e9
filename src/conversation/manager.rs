//! SessionManager — owns one conversation state per active session and runs
//! hand-offs the engine asks for.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use super::engine::{ConversationEngine, HandoffRequest, OutboundMessage, TurnOutcome};
use super::handoff::{HandoffOutcome, HandoffTrigger};
use super::record::LeadRecord;
use super::state::ConversationState;
use crate::error::SessionError;

pub type SessionId = Uuid;

/// Result of the hand-off attempted during a call, if one was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffStatus {
    Submitted,
    Failed,
}

/// Public view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    pub complete: bool,
    pub qualified: bool,
    pub handed_off: bool,
    pub message_count: u32,
    pub record: LeadRecord,
}

impl SessionSnapshot {
    fn new(session_id: SessionId, state: &ConversationState) -> Self {
        Self {
            session_id,
            current_step: state.current_step_id().map(String::from),
            complete: state.is_complete(),
            qualified: state.qualified,
            handed_off: state.handed_off,
            message_count: state.message_count,
            record: state.record.clone(),
        }
    }
}

/// What a session call hands back to the transport.
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub messages: Vec<OutboundMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TurnOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handoff: Option<HandoffStatus>,
    pub session: SessionSnapshot,
}

/// One live conversation and when the visitor last did something in it.
struct Session {
    state: ConversationState,
    last_active: Instant,
}

impl Session {
    fn new(state: ConversationState) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            state,
            last_active: Instant::now(),
        }))
    }

    fn touch(&mut self) {
        self.last_active = Instant::now();
    }
}

/// Coordinates sessions: engine turns, hand-offs, resets.
///
/// Each session's state sits behind its own mutex, held for the whole turn
/// including the CRM call, so utterances within a session never interleave.
/// Sessions nobody talks to for longer than the idle TTL are dropped by
/// [`SessionManager::evict_idle`].
pub struct SessionManager {
    engine: Arc<ConversationEngine>,
    trigger: HandoffTrigger,
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
}

impl SessionManager {
    pub fn new(engine: ConversationEngine, trigger: HandoffTrigger) -> Self {
        Self {
            engine: Arc::new(engine),
            trigger,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &ConversationEngine {
        &self.engine
    }

    /// Start a new conversation. Returns its id and the opening messages.
    pub async fn open(&self) -> (SessionId, Vec<OutboundMessage>) {
        let (state, messages) = self.engine.start();
        let id = Uuid::new_v4();
        self.sessions.write().await.insert(id, Session::new(state));
        tracing::info!(session_id = %id, "Session opened");
        (id, messages)
    }

    /// Adopt a previously exported state as a new session. The qualified
    /// flag is recomputed from the record rather than trusted.
    pub async fn resume(&self, mut state: ConversationState) -> Result<SessionId, SessionError> {
        self.engine.catalog().resolve(&state.cursor)?;
        state.qualified = self.engine.policy().is_qualified(&state.record);
        let id = Uuid::new_v4();
        self.sessions.write().await.insert(id, Session::new(state));
        tracing::info!(session_id = %id, "Session resumed");
        Ok(id)
    }

    /// Process one line of user input.
    pub async fn handle(&self, id: SessionId, text: &str) -> Result<Reply, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyInput);
        }

        let slot = self.slot(id).await?;
        let mut guard = slot.lock().await;
        guard.touch();

        let turn = self.engine.advance(guard.state.clone(), text)?;
        let mut state = turn.state;
        let mut messages = turn.messages;

        let handoff = match turn.handoff {
            Some(request) => Some(self.run_handoff(&request, &mut state, &mut messages).await),
            None => None,
        };

        guard.state = state;
        Ok(Reply {
            messages,
            outcome: Some(turn.outcome),
            handoff,
            session: SessionSnapshot::new(id, &guard.state),
        })
    }

    /// Retry a hand-off that is due but hasn't gone through yet. A no-op
    /// (no messages) when nothing is pending.
    pub async fn retry_handoff(&self, id: SessionId) -> Result<Reply, SessionError> {
        let slot = self.slot(id).await?;
        let mut guard = slot.lock().await;
        guard.touch();

        let mut messages = Vec::new();
        let handoff = match self.engine.handoff_due(&guard.state) {
            Some(request) => {
                tracing::info!(session_id = %id, "Retrying lead hand-off");
                Some(self.run_handoff(&request, &mut guard.state, &mut messages).await)
            }
            None => None,
        };

        Ok(Reply {
            messages,
            outcome: None,
            handoff,
            session: SessionSnapshot::new(id, &guard.state),
        })
    }

    /// Replace the session's state with a fresh one.
    pub async fn reset(&self, id: SessionId) -> Result<Reply, SessionError> {
        let slot = self.slot(id).await?;
        let mut guard = slot.lock().await;
        let (state, messages) = self.engine.reset();
        guard.state = state;
        guard.touch();
        tracing::info!(session_id = %id, "Session reset");
        Ok(Reply {
            messages,
            outcome: None,
            handoff: None,
            session: SessionSnapshot::new(id, &guard.state),
        })
    }

    pub async fn snapshot(&self, id: SessionId) -> Result<SessionSnapshot, SessionError> {
        let slot = self.slot(id).await?;
        let guard = slot.lock().await;
        Ok(SessionSnapshot::new(id, &guard.state))
    }

    /// Full state, for exporting a session.
    pub async fn state(&self, id: SessionId) -> Result<ConversationState, SessionError> {
        let slot = self.slot(id).await?;
        let guard = slot.lock().await;
        Ok(guard.state.clone())
    }

    pub async fn close(&self, id: SessionId) -> Result<(), SessionError> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|_| tracing::info!(session_id = %id, "Session closed"))
            .ok_or(SessionError::NotFound(id))
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions with no activity for at least `ttl`. Sessions in the
    /// middle of a turn are never dropped. Returns how many were removed.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|id, slot| match slot.try_lock() {
            Ok(session) if now.duration_since(session.last_active) >= ttl => {
                tracing::debug!(session_id = %id, "Evicting idle session");
                false
            }
            _ => true,
        });

        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, remaining = sessions.len(), "Idle sessions evicted");
        }
        evicted
    }

    /// Run [`evict_idle`](Self::evict_idle) every `every` until the manager
    /// is dropped.
    pub fn spawn_idle_sweeper(self: &Arc<Self>, ttl: Duration, every: Duration) -> JoinHandle<()> {
        let manager: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.evict_idle(ttl).await;
            }
        })
    }

    async fn slot(&self, id: SessionId) -> Result<Arc<Mutex<Session>>, SessionError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))
    }

    async fn run_handoff(
        &self,
        request: &HandoffRequest,
        state: &mut ConversationState,
        messages: &mut Vec<OutboundMessage>,
    ) -> HandoffStatus {
        let outcome = self.trigger.submit(request).await;
        messages.push(outcome.settle(state));
        match outcome {
            HandoffOutcome::Submitted(_) => HandoffStatus::Submitted,
            HandoffOutcome::Failed { .. } => HandoffStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use crate::conversation::catalog::StepCursor;
    use crate::conversation::prompts;
    use crate::crm::{CrmClient, CrmReceipt};
    use crate::error::CrmError;

    /// Records every submission; fails while `down` is set.
    #[derive(Default)]
    struct RecordingCrm {
        submitted: std::sync::Mutex<Vec<LeadRecord>>,
        down: AtomicBool,
    }

    #[async_trait]
    impl CrmClient for RecordingCrm {
        fn name(&self) -> &str {
            "recording"
        }

        async fn submit_lead(&self, record: &LeadRecord) -> Result<CrmReceipt, CrmError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(CrmError::RequestFailed {
                    crm: "recording".into(),
                    reason: "503".into(),
                });
            }
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(record.clone());
            Ok(CrmReceipt {
                contact_id: submitted.len().to_string(),
            })
        }
    }

    const ANSWERS: [&str; 13] = [
        "jane@firm.com",
        "Dupont",
        "Jane",
        "Firm SAS",
        "0612345678",
        "Bretagne",
        "1 rue de Paris",
        "bureau",
        "450 m²",
        "isolation",
        "12000 €",
        "gaz",
        "3 mois",
    ];

    fn manager(crm: Arc<RecordingCrm>) -> SessionManager {
        SessionManager::new(ConversationEngine::default(), HandoffTrigger::new(crm))
    }

    #[tokio::test]
    async fn full_conversation_hands_off_exactly_once() {
        let crm = Arc::new(RecordingCrm::default());
        let manager = manager(crm.clone());
        let (id, opening) = manager.open().await;
        assert_eq!(opening.len(), 1);

        let mut last = None;
        for answer in ANSWERS {
            last = Some(manager.handle(id, answer).await.unwrap());
        }
        let last = last.unwrap();
        assert_eq!(last.handoff, Some(HandoffStatus::Submitted));
        assert!(last.session.complete);
        assert!(last.session.handed_off);
        // Follow-up of the last step, then the confirmation.
        assert_eq!(last.messages.len(), 2);
        assert_eq!(last.messages[1].text, prompts::HANDOFF_CONFIRMED);

        // Further input after completion doesn't submit again.
        for _ in 0..3 {
            let reply = manager.handle(id, "autre chose").await.unwrap();
            assert_eq!(reply.outcome, Some(TurnOutcome::AlreadyComplete));
            assert!(reply.handoff.is_none());
        }
        let reply = manager.retry_handoff(id).await.unwrap();
        assert!(reply.handoff.is_none());
        assert!(reply.messages.is_empty());

        let submitted = crm.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].len(), 13);
    }

    #[tokio::test]
    async fn failed_handoff_keeps_record_and_can_be_retried() {
        let crm = Arc::new(RecordingCrm::default());
        crm.down.store(true, Ordering::SeqCst);
        let manager = manager(crm.clone());
        let (id, _) = manager.open().await;

        let mut last = None;
        for answer in ANSWERS {
            last = Some(manager.handle(id, answer).await.unwrap());
        }
        let last = last.unwrap();
        assert_eq!(last.handoff, Some(HandoffStatus::Failed));
        assert_eq!(last.messages.last().unwrap().text, prompts::HANDOFF_FAILED);
        assert!(!last.session.handed_off);
        assert_eq!(last.session.record.len(), 13);

        crm.down.store(false, Ordering::SeqCst);
        let reply = manager.retry_handoff(id).await.unwrap();
        assert_eq!(reply.handoff, Some(HandoffStatus::Submitted));
        assert!(reply.session.handed_off);

        // Nothing left to retry.
        let reply = manager.retry_handoff(id).await.unwrap();
        assert!(reply.handoff.is_none());
        assert_eq!(crm.submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blank_input_and_unknown_sessions_are_rejected() {
        let manager = manager(Arc::new(RecordingCrm::default()));
        let (id, _) = manager.open().await;

        assert!(matches!(manager.handle(id, "   ").await, Err(SessionError::EmptyInput)));
        let stranger = Uuid::new_v4();
        assert!(matches!(
            manager.handle(stranger, "hello").await,
            Err(SessionError::NotFound(missing)) if missing == stranger
        ));
        assert!(manager.reset(stranger).await.is_err());
        assert!(manager.close(stranger).await.is_err());
    }

    #[tokio::test]
    async fn input_is_trimmed_before_the_engine_sees_it() {
        let manager = manager(Arc::new(RecordingCrm::default()));
        let (id, _) = manager.open().await;
        let reply = manager.handle(id, "  jane@firm.com \n").await.unwrap();
        assert_eq!(
            reply.session.record.get(crate::conversation::record::LeadField::Email),
            Some("jane@firm.com")
        );
    }

    #[tokio::test]
    async fn reset_and_close() {
        let manager = manager(Arc::new(RecordingCrm::default()));
        let (id, _) = manager.open().await;
        manager.handle(id, "jane@firm.com").await.unwrap();

        let reply = manager.reset(id).await.unwrap();
        assert_eq!(reply.session.current_step.as_deref(), Some("email"));
        assert!(reply.session.record.is_empty());
        assert_eq!(reply.messages.len(), 1);

        assert_eq!(manager.session_count().await, 1);
        manager.close(id).await.unwrap();
        assert_eq!(manager.session_count().await, 0);
    }

    #[tokio::test]
    async fn export_and_resume() {
        let manager = manager(Arc::new(RecordingCrm::default()));
        let (id, _) = manager.open().await;
        manager.handle(id, "jane@firm.com").await.unwrap();
        let exported = manager.state(id).await.unwrap();

        let resumed = manager.resume(exported.clone()).await.unwrap();
        assert_ne!(resumed, id);
        assert_eq!(manager.state(resumed).await.unwrap(), exported);

        let mut corrupt = exported;
        corrupt.cursor = StepCursor::At("shoe_size".into());
        assert!(matches!(
            manager.resume(corrupt).await,
            Err(SessionError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn resume_recomputes_qualification_from_record() {
        let crm = Arc::new(RecordingCrm::default());
        let manager = manager(crm.clone());
        let stale: ConversationState = serde_json::from_value(serde_json::json!({
            "cursor": "complete",
            "record": {},
            "message_count": 1,
            "qualified": true
        }))
        .unwrap();

        let id = manager.resume(stale).await.unwrap();
        assert!(!manager.snapshot(id).await.unwrap().qualified);

        let reply = manager.retry_handoff(id).await.unwrap();
        assert!(reply.handoff.is_none());
        assert!(reply.messages.is_empty());
        let reply = manager.handle(id, "bonjour").await.unwrap();
        assert!(reply.handoff.is_none());
        assert!(crm.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_are_evicted() {
        let ttl = Duration::from_secs(30 * 60);
        let manager = manager(Arc::new(RecordingCrm::default()));
        let (idle, _) = manager.open().await;
        let (active, _) = manager.open().await;

        tokio::time::advance(Duration::from_secs(20 * 60)).await;
        manager.handle(active, "jane@firm.com").await.unwrap();
        assert_eq!(manager.evict_idle(ttl).await, 0);

        tokio::time::advance(Duration::from_secs(15 * 60)).await;
        assert_eq!(manager.evict_idle(ttl).await, 1);
        assert!(matches!(
            manager.snapshot(idle).await,
            Err(SessionError::NotFound(_))
        ));
        assert_eq!(
            manager.snapshot(active).await.unwrap().current_step.as_deref(),
            Some("lastname")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_clears_abandoned_sessions_and_stops_with_manager() {
        let manager = Arc::new(manager(Arc::new(RecordingCrm::default())));
        for _ in 0..100 {
            manager.open().await;
        }

        let sweeper =
            manager.spawn_idle_sweeper(Duration::from_secs(60), Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(75)).await;
        assert_eq!(manager.session_count().await, 0);

        drop(manager);
        sweeper.await.unwrap();
    }
}
