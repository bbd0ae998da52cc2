//! Async driver.
//!
//! Runs the session engine as a single logical actor on tokio. UI commands,
//! transport messages and timer deadlines are raced in one `select!`; the
//! winner is turned into a [`ClientEvent`] and processed to completion,
//! including every follow-up signal its actions produce, before the next
//! event is taken.
//!
//! ```text
//!   UiCommand ──┐
//!   recv()    ──┼─▶ Client::handle ─▶ actions ─┬─▶ Renderer
//!   deadline  ──┘        ▲                     ├─▶ ConnectionAdapter ─▶ Transport
//!                        └──── LinkSignal ◀────┘
//! ```

use std::{collections::VecDeque, time::Duration};

use tandem_core::env::Environment;
use tandem_proto::{Coordinates, MessageKind, ServerMessage, UserPreferences};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{
    client::Client,
    config::ClientConfig,
    connection::{ConnectionAdapter, LinkSignal},
    error::ClientError,
    event::{ClientAction, ClientEvent},
    location::LocationProvider,
    render::Renderer,
    session::SessionState,
    transport::{Transport, TransportError},
};

/// Commands from the user interface.
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    /// Setup form submitted. Coordinates are filled in by the driver for
    /// premium users when absent.
    SubmitPreferences(UserPreferences),
    /// Send a chat message.
    SendMessage {
        /// Text or image.
        kind: MessageKind,
        /// Raw content.
        payload: String,
    },
    /// Skip the current partner.
    SkipPartner,
}

/// Errors that stop the driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The state machine hit a fatal error.
    #[error("session engine failed: {0}")]
    Client(#[from] ClientError),
}

enum Wake {
    Command(Option<UiCommand>),
    Incoming(Result<ServerMessage, TransportError>),
    Deadline,
}

/// Event loop around a [`Client`].
pub struct Driver<E: Environment, T, R, L> {
    client: Client<E>,
    adapter: ConnectionAdapter<T, E>,
    renderer: R,
    locator: L,
    env: E,
}

impl<E, T, R, L> Driver<E, T, R, L>
where
    E: Environment,
    T: Transport,
    R: Renderer,
    L: LocationProvider,
{
    /// Assemble a driver.
    pub fn new(env: E, config: ClientConfig, transport: T, renderer: R, locator: L) -> Self {
        Self {
            client: Client::new(env.clone(), config),
            adapter: ConnectionAdapter::new(transport, env.clone(), config.reconnect),
            renderer,
            locator,
            env,
        }
    }

    /// The state machine.
    pub fn client(&self) -> &Client<E> {
        &self.client
    }

    /// The connection adapter.
    pub fn adapter(&self) -> &ConnectionAdapter<T, E> {
        &self.adapter
    }

    /// Run until the command channel closes.
    ///
    /// # Errors
    ///
    /// Returns `DriverError` when the state machine reports a fatal error.
    /// Transient errors are logged and the loop continues.
    pub async fn run(mut self, mut commands: mpsc::Receiver<UiCommand>) -> Result<(), DriverError> {
        tracing::info!("session driver started");

        loop {
            let deadline = self.next_wake();
            let link_up = self.adapter.is_up();

            let wake = {
                let sleep = self.env.sleep(deadline.map_or(Duration::ZERO, |at| self.until(at)));
                tokio::select! {
                    command = commands.recv() => Wake::Command(command),
                    incoming = self.adapter.recv(), if link_up => Wake::Incoming(incoming),
                    () = sleep, if deadline.is_some() => Wake::Deadline,
                }
            };

            match wake {
                Wake::Command(None) => break,
                Wake::Command(Some(command)) => {
                    let event = self.prepare(command).await;
                    self.dispatch(event).await?;
                },
                Wake::Incoming(Ok(message)) => self.dispatch(ClientEvent::Server(message)).await?,
                Wake::Incoming(Err(error)) => {
                    let signal = self.adapter.lost(error);
                    self.dispatch(signal.into_event()).await?;
                },
                Wake::Deadline => {
                    if let Some(signal) = self.adapter.retry_if_due().await {
                        self.dispatch(signal.into_event()).await?;
                    }
                    let now = self.env.now();
                    if self.client.next_deadline().is_some_and(|at| at <= now) {
                        self.dispatch(ClientEvent::Tick { now }).await?;
                    }
                },
            }
        }

        tracing::info!("command channel closed, shutting down");
        self.adapter.disconnect().await;
        Ok(())
    }

    /// Turn a UI command into an event, acquiring location if needed.
    ///
    /// Location is only awaited for a submission the machine will accept;
    /// anything else passes straight through and is rejected without delay.
    async fn prepare(&mut self, command: UiCommand) -> ClientEvent<E::Instant> {
        match command {
            UiCommand::SubmitPreferences(preferences) => {
                let wants_location = self.client.state() == SessionState::Setup
                    && preferences.is_premium
                    && preferences.coordinates().is_none();
                let preferences = if wants_location {
                    let coordinates = self.acquire_location().await;
                    preferences.with_coordinates(coordinates)
                } else {
                    preferences
                };
                ClientEvent::SubmitPreferences(preferences)
            },
            UiCommand::SendMessage { kind, payload } => ClientEvent::SendMessage { kind, payload },
            UiCommand::SkipPartner => ClientEvent::SkipPartner,
        }
    }

    /// Best-effort location, bounded by the configured timeout.
    async fn acquire_location(&mut self) -> Option<Coordinates> {
        let timeout = self.env.sleep(self.client.config().location_timeout);
        tokio::select! {
            result = self.locator.locate() => match result {
                Ok(coordinates) => Some(coordinates),
                Err(error) => {
                    tracing::info!(%error, "proceeding without location");
                    None
                },
            },
            () = timeout => {
                tracing::info!("location timed out, proceeding without it");
                None
            },
        }
    }

    /// Process one event and every signal its actions produce.
    async fn dispatch(&mut self, event: ClientEvent<E::Instant>) -> Result<(), DriverError> {
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            match self.client.handle(event) {
                Ok(actions) => {
                    for action in actions {
                        if let Some(signal) = self.execute(action).await {
                            queue.push_back(signal.into_event());
                        }
                    }
                },
                Err(error) if error.is_fatal() => return Err(error.into()),
                Err(error) => tracing::debug!(%error, "command ignored"),
            }
        }

        Ok(())
    }

    async fn execute(&mut self, action: ClientAction) -> Option<LinkSignal> {
        match action {
            ClientAction::Connect => Some(self.adapter.connect().await),
            ClientAction::Disconnect => {
                self.adapter.disconnect().await;
                None
            },
            ClientAction::Send(message) => self.adapter.send(message).await,
            ClientAction::Render(instruction) => {
                self.renderer.render(instruction);
                None
            },
        }
    }

    fn next_wake(&self) -> Option<E::Instant> {
        [self.client.next_deadline(), self.adapter.retry_deadline()].into_iter().flatten().min()
    }

    fn until(&self, at: E::Instant) -> Duration {
        let now = self.env.now();
        if at > now { at - now } else { Duration::ZERO }
    }
}
