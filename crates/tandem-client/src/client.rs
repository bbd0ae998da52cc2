//! Session state machine.
//!
//! The `Client` reconciles local commands (submit, send, skip) with backend
//! events (match, message, partner left) and connection signals, and owns
//! the one requeue timer that may be outstanding.
//!
//! # Transitions
//!
//! ```text
//!            submit                  match_found
//!   Setup ───────────▶ Searching ◀──────────────┐
//!     ▲                 │    ▲ ▲                │
//!     │ connect failed  │    │ └── skip ─── Matched
//!     └─────────────────┘    │                  │
//!                            │ requeue    partner_left
//!                            └──── Ending ◀─────┘
//! ```
//!
//! # Invariants
//!
//! - A partner is set if and only if the state is `Matched`.
//! - At most one requeue timer is pending.
//! - Every transition out of `Searching`/`Ending` other than the timer's own
//!   firing cancels the pending timer. A timer armed by `partner_left` can
//!   therefore never emit `join_queue` after a later `match_found`.

use tandem_core::{
    env::Environment,
    guard::MessageGuard,
    preferences::PreferenceStore,
    scheduler::Scheduler,
};
use tandem_proto::{
    ChatPayload, ClientMessage, MessageKind, PartnerId, ServerMessage, UserPreferences,
};

use crate::{
    config::ClientConfig,
    error::ClientError,
    event::{
        ChatMessage, ClientAction, ClientEvent, ConnectionStatus, Origin, RenderInstruction, View,
    },
    session::{LinkState, Partner, RequeueReason, RequeueTimer, Session, SessionState},
};

/// System line shown when the partner leaves.
pub const PARTNER_LEFT_NOTICE: &str = "Partner has disconnected.";

/// System line shown when an image exceeds the size ceiling.
pub const IMAGE_TOO_LARGE_NOTICE: &str = "Image is too large to send.";

/// Client state machine.
///
/// Pure state machine - returns actions, caller handles I/O.
///
/// # Type Parameters
///
/// - `E`: Environment implementation for time/randomness
pub struct Client<E: Environment> {
    /// Environment for time.
    env: E,

    /// Delays and limits.
    config: ClientConfig,

    /// Outgoing payload validation.
    guard: MessageGuard,

    /// The one session.
    session: Session,

    /// Preferences reused on every requeue.
    preferences: PreferenceStore,

    /// Timer table (only requeue timers live here).
    timers: Scheduler<E::Instant, RequeueReason>,

    /// The outstanding requeue timer, if any.
    requeue: Option<RequeueTimer<E::Instant>>,

    /// Last known connection state.
    link: LinkState,
}

impl<E: Environment> Client<E> {
    /// Create a client in `Setup`.
    pub fn new(env: E, config: ClientConfig) -> Self {
        Self {
            env,
            guard: MessageGuard::new(config.max_image_bytes),
            config,
            session: Session::default(),
            preferences: PreferenceStore::new(),
            timers: Scheduler::new(),
            requeue: None,
            link: LinkState::Idle,
        }
    }

    /// Read-only view of the session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Current partner's identifier (only while matched).
    pub fn partner_id(&self) -> Option<&PartnerId> {
        self.session.partner_id()
    }

    /// Last submitted preferences.
    pub fn preferences(&self) -> Option<&UserPreferences> {
        self.preferences.get()
    }

    /// The outstanding requeue timer.
    pub fn pending_requeue(&self) -> Option<&RequeueTimer<E::Instant>> {
        self.requeue.as_ref()
    }

    /// Number of timers live in the scheduler. Never more than one.
    pub fn pending_timer_count(&self) -> usize {
        self.timers.len()
    }

    /// When the caller should next send a `Tick`.
    pub fn next_deadline(&self) -> Option<E::Instant> {
        self.timers.next_deadline()
    }

    /// Connection state as last reported.
    pub fn link_state(&self) -> LinkState {
        self.link
    }

    /// Active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidState` for UI commands that do not apply
    /// to the current state. Backend events that do not apply are stale and
    /// are dropped without error.
    pub fn handle(
        &mut self,
        event: ClientEvent<E::Instant>,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let before = self.session.state();

        let result = match event {
            ClientEvent::SubmitPreferences(preferences) => self.handle_submit(preferences),
            ClientEvent::SendMessage { kind, payload } => self.handle_send_message(kind, payload),
            ClientEvent::SkipPartner => self.handle_skip(),
            ClientEvent::Connected => Ok(self.handle_connected()),
            ClientEvent::ConnectFailed => Ok(self.handle_connect_failed()),
            ClientEvent::ReconnectExhausted => Ok(self.handle_reconnect_exhausted()),
            ClientEvent::Server(message) => Ok(self.handle_server(message)),
            ClientEvent::Tick { now } => self.handle_tick(now),
        };

        let after = self.session.state();
        if before != after {
            tracing::debug!(from = %before, to = %after, "session transition");
        }

        result
    }

    /// Handle the setup form submission.
    fn handle_submit(
        &mut self,
        preferences: UserPreferences,
    ) -> Result<Vec<ClientAction>, ClientError> {
        self.require(SessionState::Setup, "submit preferences")?;

        let mut actions = Vec::with_capacity(3);
        if self.link != LinkState::Connected {
            self.link = LinkState::Connecting;
            actions.push(ClientAction::Connect);
        }

        self.preferences.set(preferences.clone());
        actions.push(ClientAction::Send(ClientMessage::JoinQueue(preferences)));
        actions.push(RenderInstruction::ShowView(View::Searching).into());

        self.session.enter_searching();
        Ok(actions)
    }

    /// Handle a local chat message.
    fn handle_send_message(
        &mut self,
        kind: MessageKind,
        payload: String,
    ) -> Result<Vec<ClientAction>, ClientError> {
        self.require(SessionState::Matched, "send message")?;

        match self.guard.validate(kind, payload) {
            Ok(payload) => Ok(vec![
                ClientAction::Send(ClientMessage::SendMessage(payload.clone())),
                RenderInstruction::AppendMessage(self.chat_message(Origin::Local, payload)).into(),
            ]),
            Err(error) if error.is_user_visible() => {
                tracing::warn!(%error, "outgoing message rejected");
                let notice = RenderInstruction::AppendSystemMessage(IMAGE_TOO_LARGE_NOTICE.into());
                Ok(vec![notice.into()])
            },
            Err(error) => {
                tracing::debug!(%error, "dropping empty message");
                Ok(vec![])
            },
        }
    }

    /// Handle the user skipping.
    ///
    /// While matched this leaves the partner and requeues shortly after.
    /// While the partner-left notice is showing it requeues immediately.
    fn handle_skip(&mut self) -> Result<Vec<ClientAction>, ClientError> {
        match self.session.state() {
            SessionState::Matched => {
                self.session.enter_searching();
                self.arm_requeue(RequeueReason::Skip, self.config.skip_requeue_delay);
                Ok(vec![
                    ClientAction::Send(ClientMessage::SkipPartner),
                    RenderInstruction::ResetChatView.into(),
                    RenderInstruction::ShowView(View::Searching).into(),
                ])
            },
            SessionState::Ending => {
                self.cancel_requeue();
                self.requeue_now()
            },
            state => Err(ClientError::InvalidState { state, operation: "skip partner" }),
        }
    }

    /// Handle the transport connecting.
    fn handle_connected(&mut self) -> Vec<ClientAction> {
        tracing::info!("connected");
        self.link = LinkState::Connected;
        vec![RenderInstruction::SetConnectionStatus(ConnectionStatus::Live).into()]
    }

    /// Handle a failed or dropped connection.
    ///
    /// Non-fatal: the adapter keeps retrying on its own budget. Any pairing
    /// or queue entry is gone with the connection, so the session returns to
    /// `Setup`.
    fn handle_connect_failed(&mut self) -> Vec<ClientAction> {
        tracing::info!("connection failed");
        self.link = LinkState::Connecting;

        let mut actions =
            vec![RenderInstruction::SetConnectionStatus(ConnectionStatus::Offline).into()];
        actions.extend(self.abandon_session());
        actions
    }

    /// Handle the adapter giving up.
    fn handle_reconnect_exhausted(&mut self) -> Vec<ClientAction> {
        tracing::warn!("reconnect budget exhausted, going offline");
        self.link = LinkState::Exhausted;

        let mut actions = vec![
            RenderInstruction::SetConnectionStatus(ConnectionStatus::OfflinePermanent).into(),
            ClientAction::Disconnect,
        ];
        actions.extend(self.abandon_session());
        actions
    }

    /// Handle a backend message. Messages that no longer apply are dropped.
    fn handle_server(&mut self, message: ServerMessage) -> Vec<ClientAction> {
        let state = self.session.state();
        match (message, state) {
            (ServerMessage::Waiting, SessionState::Searching) => {
                vec![RenderInstruction::ShowView(View::Searching).into()]
            },
            (
                ServerMessage::MatchFound { partner_id, bio },
                SessionState::Searching | SessionState::Ending,
            ) => {
                self.cancel_requeue();
                tracing::debug!(partner = %partner_id, "match found");
                self.session.enter_matched(Partner { id: partner_id, bio: bio.clone() });
                vec![
                    RenderInstruction::SetPartnerBio(bio).into(),
                    RenderInstruction::ResetChatView.into(),
                    RenderInstruction::ShowView(View::Chat).into(),
                ]
            },
            (ServerMessage::MessageReceived(payload), SessionState::Matched) => {
                let message = self.chat_message(Origin::Remote, payload);
                vec![RenderInstruction::AppendMessage(message).into()]
            },
            (ServerMessage::PartnerLeft, SessionState::Matched) => {
                self.session.enter_ending();
                let delay = self.config.partner_left_requeue_delay;
                self.arm_requeue(RequeueReason::PartnerLeft, delay);
                vec![RenderInstruction::AppendSystemMessage(PARTNER_LEFT_NOTICE.into()).into()]
            },
            (message, state) => {
                tracing::debug!(?message, %state, "dropping stale server message");
                vec![]
            },
        }
    }

    /// Fire due timers.
    fn handle_tick(&mut self, now: E::Instant) -> Result<Vec<ClientAction>, ClientError> {
        let mut actions = Vec::new();

        for fired in self.timers.expire(now) {
            let Some(timer) = self.requeue.filter(|t| t.handle == fired.handle) else {
                tracing::warn!(timer = fired.handle.id(), "fired timer is not the pending requeue");
                continue;
            };
            self.requeue = None;
            actions.extend(self.on_requeue_fired(timer.reason)?);
        }

        Ok(actions)
    }

    /// The requeue timer fired.
    fn on_requeue_fired(
        &mut self,
        reason: RequeueReason,
    ) -> Result<Vec<ClientAction>, ClientError> {
        match (reason, self.session.state()) {
            (RequeueReason::PartnerLeft, SessionState::Ending) => self.requeue_now(),
            (RequeueReason::Skip, SessionState::Searching) => {
                Ok(vec![ClientAction::Send(ClientMessage::JoinQueue(self.stored_preferences()?))])
            },
            (reason, state) => {
                // Unreachable while every exit from Searching/Ending cancels.
                tracing::warn!(?reason, %state, "requeue timer fired in unexpected state");
                Ok(vec![])
            },
        }
    }

    /// Clear the chat and rejoin the queue with the stored preferences.
    fn requeue_now(&mut self) -> Result<Vec<ClientAction>, ClientError> {
        let preferences = self.stored_preferences()?;
        self.session.enter_searching();
        Ok(vec![
            RenderInstruction::ResetChatView.into(),
            ClientAction::Send(ClientMessage::JoinQueue(preferences)),
            RenderInstruction::ShowView(View::Searching).into(),
        ])
    }

    /// Drop back to `Setup` after losing the connection.
    fn abandon_session(&mut self) -> Vec<ClientAction> {
        if self.session.state() == SessionState::Setup {
            return vec![];
        }
        self.cancel_requeue();
        self.session.enter_setup();
        vec![RenderInstruction::ShowView(View::Setup).into()]
    }

    /// Arm the requeue timer, replacing any pending one.
    fn arm_requeue(&mut self, reason: RequeueReason, delay: std::time::Duration) {
        self.cancel_requeue();
        let now = self.env.now();
        let handle = self.timers.schedule(now, delay, reason);
        self.requeue = Some(RequeueTimer { handle, due_at: now + delay, reason });
        tracing::debug!(?reason, ?delay, "requeue armed");
    }

    /// Cancel the pending requeue timer, if any.
    fn cancel_requeue(&mut self) {
        if let Some(timer) = self.requeue.take() {
            self.timers.cancel(timer.handle);
            tracing::debug!(reason = ?timer.reason, "requeue cancelled");
        }
    }

    fn stored_preferences(&self) -> Result<UserPreferences, ClientError> {
        self.preferences.get().cloned().ok_or(ClientError::NoStoredPreferences)
    }

    fn chat_message(&self, origin: Origin, payload: ChatPayload) -> ChatMessage {
        ChatMessage { origin, payload, timestamp_ms: self.env.wall_clock_millis() }
    }

    fn require(&self, expected: SessionState, operation: &'static str) -> Result<(), ClientError> {
        let state = self.session.state();
        if state == expected {
            Ok(())
        } else {
            tracing::warn!(%state, operation, "command rejected");
            Err(ClientError::InvalidState { state, operation })
        }
    }
}
