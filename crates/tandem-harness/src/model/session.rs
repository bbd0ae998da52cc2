//! Model session state machine.

use tandem_client::{RequeueReason, SessionState, View};

use super::operation::{Operation, OperationError, OperationResult};

/// Requeue delay after a skip, in milliseconds.
const SKIP_DELAY_MS: u64 = 500;

/// Requeue delay after the partner left, in milliseconds.
const PARTNER_LEFT_DELAY_MS: u64 = 2_000;

/// Observable state for oracle comparison.
///
/// The subset of session state that can be read off the real client and
/// the effects it emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Lifecycle state.
    pub state: SessionState,
    /// Current partner identity.
    pub partner: Option<String>,
    /// Reason of the pending requeue, if any.
    pub pending_requeue: Option<RequeueReason>,
    /// Queue entries emitted so far.
    pub joins_sent: usize,
    /// Chat messages emitted so far.
    pub messages_sent: usize,
    /// Screen currently shown.
    pub view: View,
    /// Messages in the chat view since it was last reset.
    pub transcript_len: usize,
    /// System notices shown so far.
    pub notices: usize,
}

/// Model session.
#[derive(Debug, Clone)]
pub struct ModelSession {
    image_limit: usize,
    now_ms: u64,
    state: SessionState,
    partner: Option<String>,
    timer: Option<(RequeueReason, u64)>,
    joins_sent: usize,
    messages_sent: usize,
    view: View,
    transcript_len: usize,
    notices: usize,
}

impl ModelSession {
    /// Fresh session with the given image ceiling.
    pub fn new(image_limit: usize) -> Self {
        Self {
            image_limit,
            now_ms: 0,
            state: SessionState::Setup,
            partner: None,
            timer: None,
            joins_sent: 0,
            messages_sent: 0,
            view: View::Setup,
            transcript_len: 0,
            notices: 0,
        }
    }

    /// Apply an operation and return the result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match *op {
            Operation::Submit { .. } => {
                if self.state != SessionState::Setup {
                    return OperationResult::Error(OperationError::InvalidState);
                }
                self.state = SessionState::Searching;
                self.joins_sent += 1;
                self.view = View::Searching;
            },
            Operation::SendText { message } => {
                if self.state != SessionState::Matched {
                    return OperationResult::Error(OperationError::InvalidState);
                }
                if !message.is_blank() {
                    self.send();
                }
            },
            Operation::SendImage { size } => {
                if self.state != SessionState::Matched {
                    return OperationResult::Error(OperationError::InvalidState);
                }
                let len = size.payload(self.image_limit).len();
                if len > self.image_limit {
                    self.notice();
                } else if len > 0 {
                    self.send();
                }
            },
            Operation::Skip => match self.state {
                SessionState::Matched => {
                    self.state = SessionState::Searching;
                    self.partner = None;
                    self.timer = Some((RequeueReason::Skip, self.now_ms + SKIP_DELAY_MS));
                    self.transcript_len = 0;
                    self.view = View::Searching;
                },
                SessionState::Ending => {
                    self.timer = None;
                    self.requeue();
                },
                _ => return OperationResult::Error(OperationError::InvalidState),
            },
            Operation::Waiting => {
                if self.state == SessionState::Searching {
                    self.view = View::Searching;
                }
            },
            Operation::MatchFound { partner } => {
                if matches!(self.state, SessionState::Searching | SessionState::Ending) {
                    self.timer = None;
                    self.state = SessionState::Matched;
                    self.partner = Some(format!("p{partner}"));
                    self.transcript_len = 0;
                    self.view = View::Chat;
                }
            },
            Operation::MessageReceived { .. } => {
                if self.state == SessionState::Matched {
                    self.transcript_len += 1;
                }
            },
            Operation::PartnerLeft => {
                if self.state == SessionState::Matched {
                    self.state = SessionState::Ending;
                    self.partner = None;
                    self.timer =
                        Some((RequeueReason::PartnerLeft, self.now_ms + PARTNER_LEFT_DELAY_MS));
                    self.notice();
                }
            },
            Operation::Connected => {},
            Operation::ConnectFailed | Operation::ReconnectExhausted => {
                if self.state != SessionState::Setup {
                    self.state = SessionState::Setup;
                    self.partner = None;
                    self.timer = None;
                    self.view = View::Setup;
                }
            },
            Operation::AdvanceTime { millis } => {
                self.now_ms += u64::from(millis);
                self.fire_due();
            },
        }

        OperationResult::Ok
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            state: self.state,
            partner: self.partner.clone(),
            pending_requeue: self.timer.map(|(reason, _)| reason),
            joins_sent: self.joins_sent,
            messages_sent: self.messages_sent,
            view: self.view,
            transcript_len: self.transcript_len,
            notices: self.notices,
        }
    }

    fn fire_due(&mut self) {
        let Some((reason, due)) = self.timer else { return };
        if due > self.now_ms {
            return;
        }
        self.timer = None;

        match (reason, self.state) {
            (RequeueReason::PartnerLeft, SessionState::Ending) => self.requeue(),
            (RequeueReason::Skip, SessionState::Searching) => self.joins_sent += 1,
            _ => {},
        }
    }

    fn requeue(&mut self) {
        self.state = SessionState::Searching;
        self.joins_sent += 1;
        self.transcript_len = 0;
        self.view = View::Searching;
    }

    fn notice(&mut self) {
        self.notices += 1;
        self.transcript_len += 1;
    }

    fn send(&mut self) {
        self.messages_sent += 1;
        self.transcript_len += 1;
    }
}
