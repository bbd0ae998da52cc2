//! Fuzz target for the session state machine
//!
//! Drive one client with arbitrary interleavings of UI commands, backend
//! messages, connection signals and time, and compare it with the reference
//! model after every step.
//!
//! # Invariants
//!
//! - Model and client agree on every result and observable field
//! - A partner is present exactly while `Matched`
//! - At most one requeue timer is pending
//! - A queue entry is only ever emitted into `Searching`
//! - NEVER a fatal error, NEVER panic

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tandem_client::{
    Client, ClientAction, ClientConfig, ClientEvent, Environment, Renderer, SessionState,
};
use tandem_harness::{ModelSession, ObservableState, Operation, OperationResult, SimEnv, SimScreen};
use tandem_proto::{
    ChatPayload, ClientMessage, Gender, MessageKind, PartnerId, ServerMessage, UserPreferences,
};

const IMAGE_LIMIT: usize = 32;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    seed: u64,
    operations: Vec<Operation>,
}

fn to_event(op: &Operation, env: &SimEnv) -> ClientEvent<tandem_harness::SimInstant> {
    match *op {
        Operation::Submit { premium } => ClientEvent::SubmitPreferences(UserPreferences::new(
            Gender::Other,
            Gender::Any,
            "fuzz",
            premium,
        )),
        Operation::SendText { message } => {
            ClientEvent::SendMessage { kind: MessageKind::Text, payload: message.to_text() }
        },
        Operation::SendImage { size } => ClientEvent::SendMessage {
            kind: MessageKind::Image,
            payload: size.payload(IMAGE_LIMIT),
        },
        Operation::Skip => ClientEvent::SkipPartner,
        Operation::Waiting => ClientEvent::Server(ServerMessage::Waiting),
        Operation::MatchFound { partner } => ClientEvent::Server(ServerMessage::MatchFound {
            partner_id: PartnerId::new(format!("p{partner}")),
            bio: String::new(),
        }),
        Operation::MessageReceived { message } => {
            let payload = ChatPayload::text(message.to_text());
            ClientEvent::Server(ServerMessage::MessageReceived(payload))
        },
        Operation::PartnerLeft => ClientEvent::Server(ServerMessage::PartnerLeft),
        Operation::Connected => ClientEvent::Connected,
        Operation::ConnectFailed => ClientEvent::ConnectFailed,
        Operation::ReconnectExhausted => ClientEvent::ReconnectExhausted,
        Operation::AdvanceTime { millis } => {
            env.advance(Duration::from_millis(u64::from(millis)));
            ClientEvent::Tick { now: env.now() }
        },
    }
}

fuzz_target!(|input: FuzzInput| {
    let env = SimEnv::with_seed(input.seed);
    let config = ClientConfig { max_image_bytes: IMAGE_LIMIT, ..ClientConfig::default() };
    let mut client = Client::new(env.clone(), config);
    let mut model = ModelSession::new(IMAGE_LIMIT);
    let mut screen = SimScreen::default();
    let (mut joins_sent, mut messages_sent) = (0, 0);

    for op in input.operations.iter().take(256) {
        let expected = model.apply(op);

        let actual = match client.handle(to_event(op, &env)) {
            Ok(actions) => {
                for action in actions {
                    match action {
                        ClientAction::Send(ClientMessage::JoinQueue(_)) => {
                            assert_eq!(client.state(), SessionState::Searching);
                            joins_sent += 1;
                        },
                        ClientAction::Send(ClientMessage::SendMessage(_)) => messages_sent += 1,
                        ClientAction::Render(instruction) => screen.render(instruction),
                        _ => {},
                    }
                }
                OperationResult::Ok
            },
            Err(error) => {
                assert!(!error.is_fatal(), "fatal error: {error}");
                OperationResult::Error(tandem_harness::OperationError::InvalidState)
            },
        };
        assert_eq!(expected, actual, "result divergence on {op:?}");

        let observed = ObservableState {
            state: client.state(),
            partner: client.partner_id().map(|id| id.as_str().to_owned()),
            pending_requeue: client.pending_requeue().map(|timer| timer.reason),
            joins_sent,
            messages_sent,
            view: screen.view,
            transcript_len: screen.transcript.len(),
            notices: screen.notices,
        };
        assert_eq!(model.observable_state(), observed, "state divergence on {op:?}");
        assert_eq!(client.partner_id().is_some(), client.state() == SessionState::Matched);
        assert!(client.pending_timer_count() <= 1);
    }
});
