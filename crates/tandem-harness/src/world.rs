//! Simulated deployment.
//!
//! Hosts N real [`Client`]s and one [`Matchmaker`] on a shared virtual
//! clock. Client messages reach the matchmaker synchronously; its replies
//! are queued and delivered by [`SimWorld::deliver_pending`], so tests can
//! hold messages in flight while timers run.
//!
//! ```text
//!   command ─▶ Client ─▶ Send ─▶ Matchmaker ─▶ inbox ─▶ deliver_pending ─▶ Client
//!                  └──── Render ─▶ SimScreen
//! ```

use std::{collections::VecDeque, time::Duration};

use tandem_client::{
    ChatMessage, Client, ClientAction, ClientConfig, ClientError, ClientEvent, ConnectionStatus,
    Environment, RenderInstruction, Renderer, RequeueReason, SessionState, View,
};
use tandem_proto::{ClientMessage, ServerMessage};
use tandem_server::{MatchConfig, MatchError, Matchmaker, Outbound, SessionId};
use thiserror::Error;

use crate::sim_env::{SimEnv, SimInstant};

/// One line in the chat view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Chat bubble.
    Chat(ChatMessage),
    /// System notice.
    System(String),
}

/// Headless renderer that keeps what a real screen would show.
#[derive(Debug, Clone)]
pub struct SimScreen {
    /// Screen currently shown.
    pub view: View,
    /// Chat view content since the last reset.
    pub transcript: Vec<Line>,
    /// Partner bio in the chat header.
    pub partner_bio: Option<String>,
    /// Connection indicator.
    pub status: Option<ConnectionStatus>,
    /// System notices ever shown.
    pub notices: usize,
}

impl Default for SimScreen {
    fn default() -> Self {
        Self {
            view: View::Setup,
            transcript: Vec::new(),
            partner_bio: None,
            status: None,
            notices: 0,
        }
    }
}

impl Renderer for SimScreen {
    fn render(&mut self, instruction: RenderInstruction) {
        match instruction {
            RenderInstruction::ShowView(view) => self.view = view,
            RenderInstruction::AppendMessage(message) => self.transcript.push(Line::Chat(message)),
            RenderInstruction::AppendSystemMessage(text) => {
                self.notices += 1;
                self.transcript.push(Line::System(text));
            },
            RenderInstruction::ResetChatView => self.transcript.clear(),
            RenderInstruction::SetPartnerBio(bio) => self.partner_bio = Some(bio),
            RenderInstruction::SetConnectionStatus(status) => self.status = Some(status),
        }
    }
}

/// An invariant broken during simulation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    /// Partner presence disagrees with the lifecycle state.
    #[error("client {client}: partner present is {has_partner} while {state}")]
    PartnerMismatch {
        /// Offending client.
        client: usize,
        /// Lifecycle state.
        state: SessionState,
        /// Whether a partner is set.
        has_partner: bool,
    },

    /// More than one requeue timer pending.
    #[error("client {client}: {count} timers pending")]
    TooManyTimers {
        /// Offending client.
        client: usize,
        /// Pending timers.
        count: usize,
    },

    /// A requeue timer is pending in a state it does not belong to.
    #[error("client {client}: {reason:?} requeue pending while {state}")]
    StrayTimer {
        /// Offending client.
        client: usize,
        /// Timer reason.
        reason: RequeueReason,
        /// Lifecycle state.
        state: SessionState,
    },

    /// A queue entry was emitted outside `Searching`.
    #[error("client {client}: joined queue while {state}")]
    JoinOutsideSearching {
        /// Offending client.
        client: usize,
        /// Lifecycle state after the event.
        state: SessionState,
    },

    /// With nothing in flight, the client and backend disagree on pairing.
    #[error("client {client}: believes partner {client_view:?}, backend says {backend_view:?}")]
    Desync {
        /// Offending client.
        client: usize,
        /// Partner according to the client.
        client_view: Option<String>,
        /// Partner according to the matchmaker.
        backend_view: Option<String>,
    },

    /// The matchmaker rejected a request no correct client would send.
    #[error("client {client}: backend rejected request: {error}")]
    Rejected {
        /// Offending client.
        client: usize,
        /// Matchmaker error.
        error: MatchError,
    },

    /// The client reported a fatal error.
    #[error("client {client}: fatal error: {error}")]
    Fatal {
        /// Offending client.
        client: usize,
        /// Client error.
        error: ClientError,
    },
}

/// One simulated user.
pub struct SimClient {
    client: Client<SimEnv>,
    screen: SimScreen,
    online: bool,
    reachable: bool,
    joins_sent: usize,
}

impl SimClient {
    /// The session engine.
    pub fn client(&self) -> &Client<SimEnv> {
        &self.client
    }

    /// What the user sees.
    pub fn screen(&self) -> &SimScreen {
        &self.screen
    }

    /// Queue entries this client has sent.
    pub fn joins_sent(&self) -> usize {
        self.joins_sent
    }

    /// Whether the transport is up.
    pub fn is_online(&self) -> bool {
        self.online
    }
}

/// Clients, matchmaker and the messages between them.
pub struct SimWorld {
    env: SimEnv,
    clients: Vec<SimClient>,
    matchmaker: Matchmaker,
    inbox: VecDeque<(usize, ServerMessage)>,
    violations: Vec<Violation>,
}

impl SimWorld {
    /// World with `num_clients` idle clients.
    pub fn new(num_clients: usize, seed: u64, config: ClientConfig) -> Self {
        let env = SimEnv::with_seed(seed);
        let clients = (0..num_clients)
            .map(|_| SimClient {
                client: Client::new(env.clone(), config),
                screen: SimScreen::default(),
                online: false,
                reachable: true,
                joins_sent: 0,
            })
            .collect();

        Self {
            env,
            clients,
            matchmaker: Matchmaker::new(MatchConfig::default()),
            inbox: VecDeque::new(),
            violations: Vec::new(),
        }
    }

    /// Shared environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Number of clients.
    pub fn num_clients(&self) -> usize {
        self.clients.len()
    }

    /// A client by index.
    pub fn client(&self, index: usize) -> Option<&SimClient> {
        self.clients.get(index)
    }

    /// The backend.
    pub fn matchmaker(&self) -> &Matchmaker {
        &self.matchmaker
    }

    /// Backend messages not yet delivered.
    pub fn in_flight(&self) -> usize {
        self.inbox.len()
    }

    /// Violations seen while processing actions.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Feed an event to one client and carry out everything it causes,
    /// except delivering backend replies.
    ///
    /// # Errors
    ///
    /// Returns the client's error for rejected commands.
    pub fn apply(
        &mut self,
        index: usize,
        event: ClientEvent<SimInstant>,
    ) -> Result<(), ClientError> {
        let mut queue = VecDeque::from([event]);
        let mut first = true;

        while let Some(event) = queue.pop_front() {
            let Some(sim) = self.clients.get_mut(index) else { return Ok(()) };
            let actions = match sim.client.handle(event) {
                Ok(actions) => actions,
                Err(error) if error.is_fatal() => {
                    self.violations.push(Violation::Fatal { client: index, error: error.clone() });
                    return Err(error);
                },
                Err(error) if first => return Err(error),
                Err(error) => {
                    tracing::debug!(client = index, %error, "follow-up event rejected");
                    continue;
                },
            };
            first = false;

            for action in actions {
                if let Some(event) = self.execute(index, action) {
                    queue.push_back(event);
                }
            }
        }

        Ok(())
    }

    /// Deliver every queued backend message, including replies they cause.
    pub fn deliver_pending(&mut self) {
        while let Some((index, message)) = self.inbox.pop_front() {
            let _ = self.apply(index, ClientEvent::Server(message));
        }
    }

    /// Advance the clock and tick every client.
    pub fn advance(&mut self, by: Duration) {
        self.env.advance(by);
        let now = self.env.now();
        for index in 0..self.clients.len() {
            let _ = self.apply(index, ClientEvent::Tick { now });
        }
    }

    /// Cut one client's connection. The backend drops the session and the
    /// client is told the link failed. The link comes back on the next
    /// connect unless [`SimWorld::set_reachable`] says otherwise.
    pub fn drop_connection(&mut self, index: usize) {
        let Some(sim) = self.clients.get_mut(index) else { return };
        if !sim.online {
            return;
        }
        sim.online = false;

        let outbound = self.matchmaker.disconnect(SessionId(index as u64));
        self.enqueue(outbound);
        let _ = self.apply(index, ClientEvent::ConnectFailed);
    }

    /// Make the backend (un)reachable for one client's future connects.
    pub fn set_reachable(&mut self, index: usize, reachable: bool) {
        if let Some(sim) = self.clients.get_mut(index) {
            sim.reachable = reachable;
        }
    }

    /// Check every structural invariant.
    ///
    /// # Errors
    ///
    /// Returns the first violation found, including any recorded while
    /// executing actions.
    pub fn check_invariants(&self) -> Result<(), Violation> {
        if let Some(violation) = self.violations.first() {
            return Err(violation.clone());
        }

        for (index, sim) in self.clients.iter().enumerate() {
            let client = &sim.client;
            let state = client.state();
            let has_partner = client.partner_id().is_some();

            if has_partner != (state == SessionState::Matched) {
                return Err(Violation::PartnerMismatch { client: index, state, has_partner });
            }

            let count = client.pending_timer_count();
            if count > 1 {
                return Err(Violation::TooManyTimers { client: index, count });
            }

            if let Some(timer) = client.pending_requeue() {
                let expected = match timer.reason {
                    RequeueReason::Skip => SessionState::Searching,
                    RequeueReason::PartnerLeft => SessionState::Ending,
                };
                if state != expected {
                    return Err(Violation::StrayTimer {
                        client: index,
                        reason: timer.reason,
                        state,
                    });
                }
            }

            if self.inbox.is_empty() && sim.online {
                let client_view = client.partner_id().map(|id| id.as_str().to_owned());
                let backend_view = self
                    .matchmaker
                    .partner_of(SessionId(index as u64))
                    .map(|partner| partner.partner_id().as_str().to_owned());
                if client_view.is_some() && client_view != backend_view {
                    return Err(Violation::Desync { client: index, client_view, backend_view });
                }
            }
        }

        Ok(())
    }

    fn execute(
        &mut self,
        index: usize,
        action: ClientAction,
    ) -> Option<ClientEvent<SimInstant>> {
        let session = SessionId(index as u64);
        let sim = self.clients.get_mut(index)?;

        match action {
            ClientAction::Connect => {
                if sim.reachable {
                    sim.online = true;
                    Some(ClientEvent::Connected)
                } else {
                    Some(ClientEvent::ConnectFailed)
                }
            },
            ClientAction::Disconnect => {
                sim.online = false;
                let outbound = self.matchmaker.disconnect(session);
                self.enqueue(outbound);
                None
            },
            ClientAction::Send(message) => {
                if !sim.online {
                    tracing::debug!(client = index, ?message, "offline, message dropped");
                    return None;
                }
                if let ClientMessage::JoinQueue(_) = &message {
                    sim.joins_sent += 1;
                    let state = sim.client.state();
                    if state != SessionState::Searching {
                        self.violations
                            .push(Violation::JoinOutsideSearching { client: index, state });
                    }
                }
                match self.matchmaker.handle(session, message) {
                    Ok(outbound) => self.enqueue(outbound),
                    Err(MatchError::NotPaired(_)) => {
                        tracing::debug!(client = index, "message raced a room teardown");
                    },
                    Err(error) => {
                        self.violations.push(Violation::Rejected { client: index, error });
                    },
                }
                None
            },
            ClientAction::Render(instruction) => {
                sim.screen.render(instruction);
                None
            },
        }
    }

    fn enqueue(&mut self, outbound: Vec<Outbound>) {
        for Outbound { to, message } in outbound {
            match usize::try_from(to.0) {
                Ok(index) if index < self.clients.len() => self.inbox.push_back((index, message)),
                _ => tracing::warn!(%to, "reply for unknown session"),
            }
        }
    }
}
