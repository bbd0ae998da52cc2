//! Matchmaker
//!
//! Pairs queued sessions and routes traffic between partners.
//!
//! ## Responsibilities
//!
//! - Registry: sanitised profile per connected session
//! - Queue: FIFO of sessions waiting for a partner
//! - Rooms: symmetric partner map, at most one partner per session
//! - Action generation: every operation returns the messages to deliver
//!
//! ## Matching
//!
//! A joiner is compared against the queue from the front. Both sides must
//! accept each other's gender. If the joiner is premium and both sides
//! shared a location, the candidate must also be within
//! [`MatchConfig::max_distance_km`]. The first candidate passing every
//! filter wins; otherwise the joiner is queued.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
};

use tandem_proto::{
    ChatPayload, ClientMessage, MessageKind, PartnerId, ServerMessage, UserPreferences,
};

use crate::{
    error::MatchError,
    geo::haversine_km,
    sanitize::{sanitize_bio, sanitize_text},
};

/// Transport-level identifier of a connected session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl SessionId {
    /// The identifier shown to the partner.
    pub fn partner_id(self) -> PartnerId {
        PartnerId::new(self.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Matchmaker limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchConfig {
    /// Bios are cut to this many characters after escaping.
    pub max_bio_chars: usize,
    /// Proximity radius for premium joiners.
    pub max_distance_km: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self { max_bio_chars: 50, max_distance_km: 100.0 }
    }
}

/// A registered session's sanitised preferences.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    /// Preferences as stored, bio already sanitised.
    pub preferences: UserPreferences,
}

impl Profile {
    fn accepts(&self, candidate: &Self, max_distance_km: f64) -> bool {
        let me = &self.preferences;
        let them = &candidate.preferences;

        if !me.looking_for.accepts(them.gender_identity)
            || !them.looking_for.accepts(me.gender_identity)
        {
            return false;
        }

        if me.is_premium
            && let (Some(here), Some(there)) = (me.coordinates(), them.coordinates())
        {
            return haversine_km(here, there) <= max_distance_km;
        }

        true
    }
}

/// A message to deliver to one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    /// Recipient.
    pub to: SessionId,
    /// Message for the recipient.
    pub message: ServerMessage,
}

impl Outbound {
    fn new(to: SessionId, message: ServerMessage) -> Self {
        Self { to, message }
    }
}

/// Queue and room bookkeeping for the chat backend.
#[derive(Debug, Default)]
pub struct Matchmaker {
    config: MatchConfig,
    profiles: HashMap<SessionId, Profile>,
    queue: VecDeque<SessionId>,
    partners: HashMap<SessionId, SessionId>,
}

impl Matchmaker {
    /// Empty matchmaker.
    pub fn new(config: MatchConfig) -> Self {
        Self { config, ..Self::default() }
    }

    /// Active limits.
    pub fn config(&self) -> MatchConfig {
        self.config
    }

    /// Registered sessions.
    pub fn session_count(&self) -> usize {
        self.profiles.len()
    }

    /// Sessions waiting for a partner.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Whether `session` is waiting in the queue.
    pub fn is_queued(&self, session: SessionId) -> bool {
        self.queue.contains(&session)
    }

    /// Current partner of `session`.
    pub fn partner_of(&self, session: SessionId) -> Option<SessionId> {
        self.partners.get(&session).copied()
    }

    /// Stored profile of `session`.
    pub fn profile(&self, session: SessionId) -> Option<&Profile> {
        self.profiles.get(&session)
    }

    /// Dispatch a decoded client message.
    pub fn handle(
        &mut self,
        session: SessionId,
        message: ClientMessage,
    ) -> Result<Vec<Outbound>, MatchError> {
        match message {
            ClientMessage::JoinQueue(preferences) => self.join_queue(session, preferences),
            ClientMessage::SendMessage(payload) => self.relay(session, payload),
            ClientMessage::SkipPartner => self.skip(session),
        }
    }

    /// Register (or re-register) `session` and try to pair it.
    ///
    /// Emits `MatchFound` to both sides on success, `Waiting` to the joiner
    /// otherwise.
    pub fn join_queue(
        &mut self,
        session: SessionId,
        preferences: UserPreferences,
    ) -> Result<Vec<Outbound>, MatchError> {
        if let Some(partner) = self.partner_of(session) {
            return Err(MatchError::AlreadyPaired { session, partner });
        }

        let bio = sanitize_bio(&preferences.bio_text, self.config.max_bio_chars);
        let profile = Profile { preferences: UserPreferences { bio_text: bio, ..preferences } };
        self.profiles.insert(session, profile);

        let Some(candidate) = self.find_candidate(session) else {
            if !self.is_queued(session) {
                self.queue.push_back(session);
            }
            tracing::debug!(%session, queued = self.queue.len(), "no match, waiting");
            return Ok(vec![Outbound::new(session, ServerMessage::Waiting)]);
        };

        self.queue.retain(|queued| *queued != session && *queued != candidate);
        self.partners.insert(session, candidate);
        self.partners.insert(candidate, session);
        tracing::info!(%session, %candidate, "paired");

        Ok(vec![
            Outbound::new(session, self.match_found(candidate)),
            Outbound::new(candidate, self.match_found(session)),
        ])
    }

    /// Forward a chat payload to the sender's partner.
    ///
    /// Text is sanitised on the way through. Images are forwarded as is.
    pub fn relay(
        &mut self,
        session: SessionId,
        payload: ChatPayload,
    ) -> Result<Vec<Outbound>, MatchError> {
        self.require_registered(session)?;
        let partner = self.partner_of(session).ok_or(MatchError::NotPaired(session))?;

        let payload = match payload.kind {
            MessageKind::Text => ChatPayload::text(sanitize_text(&payload.content)),
            MessageKind::Image => payload,
        };

        Ok(vec![Outbound::new(partner, ServerMessage::MessageReceived(payload))])
    }

    /// Dissolve the sender's room and notify the partner.
    ///
    /// Skipping while unpaired does nothing: both members may skip at once
    /// and the second request finds the room already gone.
    pub fn skip(&mut self, session: SessionId) -> Result<Vec<Outbound>, MatchError> {
        self.require_registered(session)?;

        match self.dissolve(session) {
            Some(partner) => {
                tracing::info!(%session, %partner, "skipped");
                Ok(vec![Outbound::new(partner, ServerMessage::PartnerLeft)])
            },
            None => {
                tracing::debug!(%session, "skip without partner ignored");
                Ok(Vec::new())
            },
        }
    }

    /// Forget `session` entirely. Idempotent.
    pub fn disconnect(&mut self, session: SessionId) -> Vec<Outbound> {
        self.profiles.remove(&session);
        self.queue.retain(|queued| *queued != session);

        match self.dissolve(session) {
            Some(partner) => {
                tracing::info!(%session, %partner, "disconnected from room");
                vec![Outbound::new(partner, ServerMessage::PartnerLeft)]
            },
            None => Vec::new(),
        }
    }

    fn find_candidate(&self, session: SessionId) -> Option<SessionId> {
        let me = self.profiles.get(&session)?;

        self.queue.iter().copied().filter(|candidate| *candidate != session).find(|candidate| {
            self.profiles
                .get(candidate)
                .is_some_and(|them| me.accepts(them, self.config.max_distance_km))
        })
    }

    fn match_found(&self, partner: SessionId) -> ServerMessage {
        let bio = self
            .profiles
            .get(&partner)
            .map(|profile| profile.preferences.bio_text.clone())
            .unwrap_or_default();
        ServerMessage::MatchFound { partner_id: partner.partner_id(), bio }
    }

    fn dissolve(&mut self, session: SessionId) -> Option<SessionId> {
        let partner = self.partners.remove(&session)?;
        self.partners.remove(&partner);
        Some(partner)
    }

    fn require_registered(&self, session: SessionId) -> Result<(), MatchError> {
        if self.profiles.contains_key(&session) {
            Ok(())
        } else {
            Err(MatchError::UnknownSession(session))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tandem_proto::{Coordinates, Gender};

    use super::*;

    fn prefs(gender: Gender, looking_for: Gender) -> UserPreferences {
        UserPreferences::new(gender, looking_for, "bio", false)
    }

    fn s(id: u64) -> SessionId {
        SessionId(id)
    }

    #[test]
    fn first_joiner_waits() {
        let mut mm = Matchmaker::default();
        let out = mm.join_queue(s(1), prefs(Gender::Male, Gender::Any)).unwrap();

        assert_eq!(out, vec![Outbound::new(s(1), ServerMessage::Waiting)]);
        assert!(mm.is_queued(s(1)));
    }

    #[test]
    fn compatible_pair_matches_and_exchanges_bios() {
        let mut mm = Matchmaker::default();
        mm.join_queue(s(1), UserPreferences::new(Gender::Male, Gender::Any, "one", false))
            .unwrap();
        let out = mm
            .join_queue(s(2), UserPreferences::new(Gender::Female, Gender::Any, "two", false))
            .unwrap();

        assert_eq!(out, vec![
            Outbound::new(s(2), ServerMessage::MatchFound {
                partner_id: s(1).partner_id(),
                bio: "one".into()
            }),
            Outbound::new(s(1), ServerMessage::MatchFound {
                partner_id: s(2).partner_id(),
                bio: "two".into()
            }),
        ]);
        assert_eq!(mm.partner_of(s(1)), Some(s(2)));
        assert_eq!(mm.partner_of(s(2)), Some(s(1)));
        assert_eq!(mm.queue_len(), 0);
    }

    #[test]
    fn gender_filter_applies_both_ways() {
        let mut mm = Matchmaker::default();
        mm.join_queue(s(1), prefs(Gender::Male, Gender::Female)).unwrap();

        // s2 accepts s1 but s1 does not accept s2.
        let out = mm.join_queue(s(2), prefs(Gender::Male, Gender::Any)).unwrap();
        assert_eq!(out, vec![Outbound::new(s(2), ServerMessage::Waiting)]);

        let out = mm.join_queue(s(3), prefs(Gender::Female, Gender::Male)).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(mm.partner_of(s(3)), Some(s(1)));
        assert!(mm.is_queued(s(2)));
    }

    #[test]
    fn undisclosed_gender_only_matches_open_filters() {
        let mut mm = Matchmaker::default();
        mm.join_queue(s(1), prefs(Gender::Any, Gender::Any)).unwrap();

        mm.join_queue(s(2), prefs(Gender::Male, Gender::Female)).unwrap();
        assert_eq!(mm.partner_of(s(2)), None);

        mm.join_queue(s(3), prefs(Gender::Female, Gender::Any)).unwrap();
        assert_eq!(mm.partner_of(s(3)), Some(s(1)));
    }

    #[test]
    fn queue_is_first_come_first_served() {
        let mut mm = Matchmaker::default();
        mm.join_queue(s(1), prefs(Gender::Male, Gender::Any)).unwrap();
        mm.join_queue(s(2), prefs(Gender::Male, Gender::Male)).unwrap();
        assert_eq!(mm.partner_of(s(2)), Some(s(1)));

        mm.join_queue(s(3), prefs(Gender::Female, Gender::Female)).unwrap();
        mm.join_queue(s(4), prefs(Gender::Female, Gender::Female)).unwrap();
        mm.join_queue(s(5), prefs(Gender::Female, Gender::Female)).unwrap();
        assert_eq!(mm.partner_of(s(4)), Some(s(3)));
        assert!(mm.is_queued(s(5)));
    }

    #[test]
    fn premium_joiner_filters_by_distance() {
        let zurich = Coordinates::new(47.37, 8.54);
        let basel = Coordinates::new(47.56, 7.59);
        let tokyo = Coordinates::new(35.68, 139.69);

        let mut mm = Matchmaker::default();
        mm.join_queue(s(1), prefs(Gender::Male, Gender::Any).with_coordinates(Some(tokyo)))
            .unwrap();
        mm.join_queue(s(2), prefs(Gender::Male, Gender::Any).with_coordinates(Some(basel)))
            .unwrap();
        // s1 and s2 are both non-premium, so they matched regardless of distance.
        assert_eq!(mm.partner_of(s(1)), Some(s(2)));

        mm.join_queue(s(3), prefs(Gender::Male, Gender::Any).with_coordinates(Some(tokyo)))
            .unwrap();
        let premium = UserPreferences::new(Gender::Female, Gender::Any, "", true)
            .with_coordinates(Some(zurich));
        mm.join_queue(s(4), premium).unwrap();
        assert_eq!(mm.partner_of(s(4)), None);
        assert_eq!(mm.queue_len(), 2);

        mm.join_queue(s(5), prefs(Gender::Male, Gender::Any).with_coordinates(Some(basel)))
            .unwrap();
        // s5 is not premium, so s3 (first in queue) is taken regardless of distance.
        assert_eq!(mm.partner_of(s(5)), Some(s(3)));
    }

    #[test]
    fn premium_joiner_without_location_matches_anyone() {
        let mut mm = Matchmaker::default();
        mm.join_queue(
            s(1),
            prefs(Gender::Male, Gender::Any).with_coordinates(Some(Coordinates::new(0.0, 0.0))),
        )
        .unwrap();
        mm.join_queue(s(2), UserPreferences::new(Gender::Female, Gender::Any, "", true)).unwrap();
        assert_eq!(mm.partner_of(s(2)), Some(s(1)));
    }

    #[test]
    fn bio_is_sanitised_and_cut() {
        let mut mm = Matchmaker::default();
        let long = format!("  <b>{}</b>  ", "x".repeat(100));
        mm.join_queue(s(1), UserPreferences::new(Gender::Any, Gender::Any, long, false)).unwrap();

        let bio = &mm.profile(s(1)).unwrap().preferences.bio_text;
        assert!(bio.starts_with("&lt;b&gt;"));
        assert_eq!(bio.chars().count(), 50);
    }

    #[test]
    fn rejoin_while_queued_keeps_single_entry() {
        let mut mm = Matchmaker::default();
        mm.join_queue(s(1), prefs(Gender::Male, Gender::Female)).unwrap();
        mm.join_queue(s(1), prefs(Gender::Male, Gender::Female)).unwrap();
        assert_eq!(mm.queue_len(), 1);
    }

    #[test]
    fn rejoin_while_paired_is_rejected() {
        let mut mm = Matchmaker::default();
        mm.join_queue(s(1), prefs(Gender::Male, Gender::Any)).unwrap();
        mm.join_queue(s(2), prefs(Gender::Male, Gender::Any)).unwrap();

        let err = mm.join_queue(s(1), prefs(Gender::Male, Gender::Any)).unwrap_err();
        assert_eq!(err, MatchError::AlreadyPaired { session: s(1), partner: s(2) });
    }

    #[test]
    fn relay_reaches_partner_only() {
        let mut mm = Matchmaker::default();
        mm.join_queue(s(1), prefs(Gender::Male, Gender::Any)).unwrap();
        mm.join_queue(s(2), prefs(Gender::Male, Gender::Any)).unwrap();

        let out = mm.relay(s(1), ChatPayload::text(" <hi> ")).unwrap();
        assert_eq!(out, vec![Outbound::new(
            s(2),
            ServerMessage::MessageReceived(ChatPayload::text("&lt;hi&gt;"))
        )]);
    }

    #[test]
    fn relay_leaves_images_untouched() {
        let mut mm = Matchmaker::default();
        mm.join_queue(s(1), prefs(Gender::Male, Gender::Any)).unwrap();
        mm.join_queue(s(2), prefs(Gender::Male, Gender::Any)).unwrap();

        let image = ChatPayload::image("data:image/png;base64,<>");
        let out = mm.relay(s(2), image.clone()).unwrap();
        assert_eq!(out, vec![Outbound::new(s(1), ServerMessage::MessageReceived(image))]);
    }

    #[test]
    fn relay_requires_partner() {
        let mut mm = Matchmaker::default();
        assert_eq!(
            mm.relay(s(9), ChatPayload::text("hi")),
            Err(MatchError::UnknownSession(s(9)))
        );

        mm.join_queue(s(1), prefs(Gender::Male, Gender::Any)).unwrap();
        assert_eq!(mm.relay(s(1), ChatPayload::text("hi")), Err(MatchError::NotPaired(s(1))));
    }

    #[test]
    fn skip_notifies_partner_and_frees_both() {
        let mut mm = Matchmaker::default();
        mm.join_queue(s(1), prefs(Gender::Male, Gender::Any)).unwrap();
        mm.join_queue(s(2), prefs(Gender::Male, Gender::Any)).unwrap();

        let out = mm.skip(s(1)).unwrap();
        assert_eq!(out, vec![Outbound::new(s(2), ServerMessage::PartnerLeft)]);
        assert_eq!(mm.partner_of(s(1)), None);
        assert_eq!(mm.partner_of(s(2)), None);
        assert!(!mm.is_queued(s(1)));

        // Simultaneous skip from the other side.
        assert_eq!(mm.skip(s(2)), Ok(Vec::new()));
    }

    #[test]
    fn disconnect_notifies_partner_and_forgets_session() {
        let mut mm = Matchmaker::default();
        mm.join_queue(s(1), prefs(Gender::Male, Gender::Any)).unwrap();
        mm.join_queue(s(2), prefs(Gender::Male, Gender::Any)).unwrap();

        let out = mm.disconnect(s(2));
        assert_eq!(out, vec![Outbound::new(s(1), ServerMessage::PartnerLeft)]);
        assert_eq!(mm.session_count(), 1);
        assert_eq!(mm.partner_of(s(1)), None);

        assert!(mm.disconnect(s(2)).is_empty());
    }

    #[test]
    fn disconnect_removes_from_queue() {
        let mut mm = Matchmaker::default();
        mm.join_queue(s(1), prefs(Gender::Male, Gender::Any)).unwrap();
        assert!(mm.disconnect(s(1)).is_empty());
        assert_eq!(mm.queue_len(), 0);

        let out = mm.join_queue(s(2), prefs(Gender::Male, Gender::Any)).unwrap();
        assert_eq!(out, vec![Outbound::new(s(2), ServerMessage::Waiting)]);
    }

    #[test]
    fn handle_dispatches_client_messages() {
        let mut mm = Matchmaker::default();
        mm.handle(s(1), ClientMessage::JoinQueue(prefs(Gender::Male, Gender::Any))).unwrap();
        mm.handle(s(2), ClientMessage::JoinQueue(prefs(Gender::Male, Gender::Any))).unwrap();

        let out = mm.handle(s(1), ClientMessage::SkipPartner).unwrap();
        assert_eq!(out, vec![Outbound::new(s(2), ServerMessage::PartnerLeft)]);
    }
}
