//! Process-wide map of guild sessions.

use crate::error::SessionError;
use crate::session::GuildSession;
use murmur_types::GuildId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug)]
enum Slot {
    /// A join is connecting to voice; the guild is claimed but has no
    /// session yet.
    Joining,
    Active(Arc<GuildSession>),
}

/// Synchronized guild → session map.
///
/// Uses `std::sync::RwLock`: every acquisition is a single HashMap operation
/// that never spans an `.await` point.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<GuildId, Slot>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<GuildId, Slot>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<GuildId, Slot>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotFound` if the guild has no active session.
    /// A join still in progress counts as not found.
    pub fn lookup(&self, guild: &GuildId) -> Result<Arc<GuildSession>, SessionError> {
        match self.read().get(guild) {
            Some(Slot::Active(session)) => Ok(Arc::clone(session)),
            _ => Err(SessionError::NotFound(guild.clone())),
        }
    }

    /// Adds a session under its own guild id.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyJoined` if the guild is taken.
    pub fn register(&self, session: Arc<GuildSession>) -> Result<(), SessionError> {
        let mut map = self.write();
        let guild = session.guild_id().clone();
        if map.contains_key(&guild) {
            return Err(SessionError::AlreadyJoined(guild));
        }
        map.insert(guild, Slot::Active(session));
        Ok(())
    }

    /// Removes the active session of `guild`, if any. Calling this for a
    /// guild without a session is a no-op.
    pub fn unregister(&self, guild: &GuildId) -> Option<Arc<GuildSession>> {
        let mut map = self.write();
        match map.get(guild) {
            Some(Slot::Active(_)) => match map.remove(guild) {
                Some(Slot::Active(session)) => Some(session),
                _ => None,
            },
            _ => None,
        }
    }

    /// Claims `guild` for a join in progress.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyJoined` if the guild has a session or
    /// another reservation.
    pub fn reserve(&self, guild: &GuildId) -> Result<JoinReservation, SessionError> {
        let mut map = self.write();
        if map.contains_key(guild) {
            return Err(SessionError::AlreadyJoined(guild.clone()));
        }
        map.insert(guild.clone(), Slot::Joining);
        Ok(JoinReservation {
            registry: self.clone(),
            guild: guild.clone(),
            committed: false,
        })
    }

    /// Active sessions at call time. The lock is released before returning.
    pub fn snapshot(&self) -> Vec<Arc<GuildSession>> {
        self.read()
            .values()
            .filter_map(|slot| match slot {
                Slot::Active(session) => Some(Arc::clone(session)),
                Slot::Joining => None,
            })
            .collect()
    }

    /// Number of active sessions.
    pub fn len(&self) -> usize {
        self.read()
            .values()
            .filter(|slot| matches!(slot, Slot::Active(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A claimed guild slot. Dropping it without [`commit`](Self::commit)
/// releases the claim.
#[derive(Debug)]
pub struct JoinReservation {
    registry: SessionRegistry,
    guild: GuildId,
    committed: bool,
}

impl JoinReservation {
    pub fn guild_id(&self) -> &GuildId {
        &self.guild
    }

    /// Turns the claim into an active session.
    pub fn commit(mut self, session: Arc<GuildSession>) {
        debug_assert_eq!(session.guild_id(), &self.guild);
        self.registry
            .write()
            .insert(self.guild.clone(), Slot::Active(session));
        self.committed = true;
    }
}

impl Drop for JoinReservation {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut map = self.registry.write();
        if matches!(map.get(&self.guild), Some(Slot::Joining)) {
            map.remove(&self.guild);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_types::ChannelId;
    use murmur_voice::VoiceConnection;

    fn session(guild: &str) -> Arc<GuildSession> {
        Arc::new(GuildSession::new(
            ChannelId::from("text"),
            VoiceConnection {
                guild_id: GuildId::from(guild),
                channel_id: ChannelId::from("voice"),
            },
            50,
        ))
    }

    #[test]
    fn register_lookup_unregister() {
        let registry = SessionRegistry::new();
        let guild = GuildId::from("a");

        assert!(matches!(registry.lookup(&guild), Err(SessionError::NotFound(_))));
        registry.register(session("a")).unwrap();
        assert_eq!(registry.lookup(&guild).unwrap().guild_id(), &guild);
        assert!(matches!(
            registry.register(session("a")),
            Err(SessionError::AlreadyJoined(_))
        ));

        assert!(registry.unregister(&guild).is_some());
        assert!(registry.unregister(&guild).is_none());
        assert!(matches!(registry.lookup(&guild), Err(SessionError::NotFound(_))));
    }

    #[test]
    fn reservation_blocks_then_releases() {
        let registry = SessionRegistry::new();
        let guild = GuildId::from("a");

        let reservation = registry.reserve(&guild).unwrap();
        assert!(matches!(
            registry.reserve(&guild),
            Err(SessionError::AlreadyJoined(_))
        ));
        assert!(matches!(
            registry.register(session("a")),
            Err(SessionError::AlreadyJoined(_))
        ));
        // A join in progress is not a session.
        assert!(registry.lookup(&guild).is_err());
        assert!(registry.unregister(&guild).is_none());
        assert_eq!(registry.len(), 0);

        drop(reservation);
        assert!(registry.reserve(&guild).is_ok());
    }

    #[test]
    fn committed_reservation_becomes_session() {
        let registry = SessionRegistry::new();
        let guild = GuildId::from("a");

        registry.reserve(&guild).unwrap().commit(session("a"));
        assert!(registry.lookup(&guild).is_ok());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[test]
    fn guilds_are_independent() {
        let registry = SessionRegistry::new();
        registry.register(session("a")).unwrap();
        let _b = registry.reserve(&GuildId::from("b")).unwrap();
        registry.register(session("c")).unwrap();

        let mut guilds: Vec<String> = registry
            .snapshot()
            .iter()
            .map(|s| s.guild_id().to_string())
            .collect();
        guilds.sort();
        assert_eq!(guilds, ["a", "c"]);
    }
}
