//! The room coordinator: create, join, start, leave, close.
//!
//! Room records live in the data store's `Room` collection. Each room's
//! membership changes are serialized by a per-room lock, and each
//! player's "which room am I in" changes by a per-player lock. Locks are
//! always taken player first, then room.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use playhub_catalog::{ArtifactStore, CatalogManager, GameVersion};
use playhub_protocol::{
    AccountId, Collection, GameId, Room, RoomId, RoomStatus, RoomView, unix_now,
};
use playhub_store::{
    DataStore, KeyedLocks, Mutation, create_record, get_record, list_records, update_record,
};

use crate::RoomError;

/// Result of a join attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    /// The player is now a member; the room as it stands after the join.
    Joined(Room),
    /// The player's installed build differs from the room's pinned one.
    /// Nothing changed; the caller may download `required_version` and
    /// try again.
    VersionMismatch {
        game_id: GameId,
        required_version: String,
    },
}

/// Result of a successful leave.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaveOutcome {
    pub room_id: RoomId,
    /// The room after the leave, or `None` if it emptied and was deleted.
    pub room: Option<Room>,
    /// Set when the leaver was host and someone else took over.
    pub new_host: Option<AccountId>,
}

pub struct RoomCoordinator<S: DataStore, A: ArtifactStore> {
    store: Arc<S>,
    catalog: Arc<CatalogManager<S, A>>,
    room_locks: KeyedLocks<RoomId>,
    player_locks: KeyedLocks<AccountId>,
    /// Which room each player is in. A player is in at most one room.
    memberships: Mutex<HashMap<AccountId, RoomId>>,
}

impl<S: DataStore, A: ArtifactStore> RoomCoordinator<S, A> {
    pub fn new(store: Arc<S>, catalog: Arc<CatalogManager<S, A>>) -> Self {
        Self {
            store,
            catalog,
            room_locks: KeyedLocks::new(),
            player_locks: KeyedLocks::new(),
            memberships: Mutex::new(HashMap::new()),
        }
    }

    /// Deletes every stored room. Rooms are bound to live connections, so
    /// the lobby calls this once at startup to drop leftovers from a
    /// previous run.
    pub async fn reset(&self) -> Result<usize, RoomError> {
        let rooms = self.store.list(Collection::Room).await?;
        for id in rooms.keys() {
            self.store.delete(Collection::Room, id).await?;
        }
        self.index().clear();
        if !rooms.is_empty() {
            tracing::info!(count = rooms.len(), "stale rooms cleared");
        }
        Ok(rooms.len())
    }

    fn index(&self) -> std::sync::MutexGuard<'_, HashMap<AccountId, RoomId>> {
        self.memberships.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The room `account_id` is currently in.
    pub fn room_of(&self, account_id: &AccountId) -> Option<RoomId> {
        self.index().get(account_id).cloned()
    }

    /// Every live room, oldest first.
    pub async fn list(&self) -> Result<Vec<RoomView>, RoomError> {
        let mut rooms: Vec<Room> = list_records(self.store.as_ref(), Collection::Room).await?;
        rooms.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(rooms.iter().map(Room::view).collect())
    }

    pub async fn get(&self, room_id: &RoomId) -> Result<Room, RoomError> {
        get_record::<Room, S>(self.store.as_ref(), Collection::Room, room_id.as_str())
            .await?
            .map(|r| r.value)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))
    }

    /// Opens a room for `game_id` with `host_id` as its only member.
    ///
    /// The room is pinned to `requested_version` if given (it must be a
    /// published version), otherwise to the game's latest version.
    ///
    /// # Errors
    /// - [`RoomError::GameUnavailable`] if the game is archived
    /// - [`RoomError::InvalidVersion`] for an unpublished version
    /// - [`RoomError::AlreadyInRoom`] if the host is in another room
    pub async fn create(
        &self,
        host_id: &AccountId,
        game_id: &GameId,
        requested_version: Option<&str>,
    ) -> Result<Room, RoomError> {
        let _player = self.player_locks.lock(host_id.clone()).await;
        if let Some(current) = self.room_of(host_id) {
            return Err(RoomError::AlreadyInRoom(current));
        }

        let game = self.catalog.details(game_id).await?;
        if !game.is_active() {
            return Err(RoomError::GameUnavailable(game_id.clone()));
        }
        let game_version = match requested_version {
            Some(v) => game
                .find_version(v)
                .ok_or_else(|| RoomError::InvalidVersion(v.to_string()))?
                .to_string(),
            None => game.latest_version.clone(),
        };

        let room = Room {
            id: RoomId::generate(),
            host_id: host_id.clone(),
            game_id: game.id.clone(),
            game_name: game.name.clone(),
            game_version,
            status: RoomStatus::Open,
            members: vec![host_id.clone()],
            min_players: game.min_players,
            max_players: game.max_players,
            created_at: unix_now(),
        };
        create_record(self.store.as_ref(), Collection::Room, room.id.as_str(), &room).await?;
        self.index().insert(host_id.clone(), room.id.clone());

        tracing::info!(
            room_id = %room.id,
            %host_id,
            %game_id,
            version = %room.game_version,
            "room created"
        );
        Ok(room)
    }

    /// Adds `account_id` to an open room whose pinned version matches the
    /// player's installed one.
    ///
    /// Checks run in this order: open, capacity, version. A player with no
    /// installed build, or with any other build (newer or older), gets
    /// [`JoinOutcome::VersionMismatch`] and is not added.
    pub async fn join(
        &self,
        account_id: &AccountId,
        room_id: &RoomId,
        client_version: Option<&str>,
    ) -> Result<JoinOutcome, RoomError> {
        let _player = self.player_locks.lock(account_id.clone()).await;
        if let Some(current) = self.room_of(account_id) {
            return Err(RoomError::AlreadyInRoom(current));
        }
        let _room = self.room_locks.lock(room_id.clone()).await;

        let outcome = update_record(
            self.store.as_ref(),
            Collection::Room,
            room_id.as_str(),
            |current: Option<Room>| -> Result<(Mutation<Room>, JoinOutcome), RoomError> {
                let mut room = current.ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;
                if !room.status.is_joinable() {
                    return Err(RoomError::RoomNotOpen(room_id.clone()));
                }
                if room.is_full() {
                    return Err(RoomError::RoomFull(room_id.clone()));
                }
                if !client_version.is_some_and(|v| GameVersion::same(v, &room.game_version)) {
                    let mismatch = JoinOutcome::VersionMismatch {
                        game_id: room.game_id.clone(),
                        required_version: room.game_version.clone(),
                    };
                    return Ok((Mutation::Keep, mismatch));
                }
                room.members.push(account_id.clone());
                Ok((Mutation::Write(room.clone()), JoinOutcome::Joined(room)))
            },
        )
        .await?;

        match &outcome {
            JoinOutcome::Joined(room) => {
                self.index().insert(account_id.clone(), room.id.clone());
                tracing::info!(%room_id, %account_id, members = room.members.len(), "player joined");
            }
            JoinOutcome::VersionMismatch {
                required_version, ..
            } => {
                tracing::info!(
                    %room_id,
                    %account_id,
                    client_version = ?client_version,
                    required_version,
                    "join refused: version mismatch"
                );
            }
        }
        Ok(outcome)
    }

    /// Starts the game. Host only, and only with enough players.
    ///
    /// Every member gets a play record for the game, which is what allows
    /// them to review it later. Plays are recorded before the room is
    /// marked in progress; if recording fails the room stays open and the
    /// host may retry. Membership cannot change in between, since join and
    /// leave take the same room lock.
    pub async fn start(&self, host_id: &AccountId, room_id: &RoomId) -> Result<Room, RoomError> {
        let _room = self.room_locks.lock(room_id.clone()).await;

        let pending = self.get(room_id).await?;
        check_startable(&pending, host_id)?;
        for member in &pending.members {
            self.catalog.record_play(member, &pending.game_id).await?;
        }

        let room = update_record(
            self.store.as_ref(),
            Collection::Room,
            room_id.as_str(),
            |current: Option<Room>| -> Result<(Mutation<Room>, Room), RoomError> {
                let mut room = current.ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;
                check_startable(&room, host_id)?;
                room.status = RoomStatus::InProgress;
                Ok((Mutation::Write(room.clone()), room))
            },
        )
        .await?;

        tracing::info!(%room_id, game_id = %room.game_id, version = %room.game_version, "game started");
        Ok(room)
    }

    /// Removes `account_id` from `room_id`.
    ///
    /// The last member out deletes the room. If the host leaves while
    /// others remain, the earliest-joined remaining member becomes host.
    pub async fn leave(
        &self,
        account_id: &AccountId,
        room_id: &RoomId,
    ) -> Result<LeaveOutcome, RoomError> {
        let _player = self.player_locks.lock(account_id.clone()).await;
        let _room = self.room_locks.lock(room_id.clone()).await;

        let (room, new_host) = update_record(
            self.store.as_ref(),
            Collection::Room,
            room_id.as_str(),
            |current: Option<Room>| -> Result<(Mutation<Room>, (Option<Room>, Option<AccountId>)), RoomError> {
                let mut room = current.ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;
                if !room.is_member(account_id) {
                    return Err(RoomError::NotInRoom);
                }
                room.members.retain(|m| m != account_id);

                let Some(first) = room.members.first().cloned() else {
                    return Ok((Mutation::Delete, (None, None)));
                };
                let new_host = (&room.host_id == account_id).then(|| {
                    room.host_id = first.clone();
                    first
                });
                Ok((Mutation::Write(room.clone()), (Some(room), new_host)))
            },
        )
        .await?;

        {
            let mut index = self.index();
            if index.get(account_id) == Some(room_id) {
                index.remove(account_id);
            }
        }

        match (&room, &new_host) {
            (None, _) => tracing::info!(%room_id, %account_id, "last member left, room closed"),
            (Some(_), Some(host)) => {
                tracing::info!(%room_id, %account_id, new_host = %host, "host left, host transferred")
            }
            (Some(_), None) => tracing::info!(%room_id, %account_id, "player left"),
        }
        Ok(LeaveOutcome {
            room_id: room_id.clone(),
            room,
            new_host,
        })
    }

    /// Leaves whatever room `account_id` is in. `Ok(None)` if none.
    pub async fn leave_current(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<LeaveOutcome>, RoomError> {
        match self.room_of(account_id) {
            Some(room_id) => match self.leave(account_id, &room_id).await {
                Ok(outcome) => Ok(Some(outcome)),
                Err(RoomError::RoomNotFound(_) | RoomError::NotInRoom) => {
                    self.index().remove(account_id);
                    Ok(None)
                }
                Err(e) => Err(e),
            },
            None => Ok(None),
        }
    }

    /// Ends a room on the host's behalf, removing every member.
    /// Returns the room as it was, so members can be told.
    pub async fn close(&self, host_id: &AccountId, room_id: &RoomId) -> Result<Room, RoomError> {
        let _room = self.room_locks.lock(room_id.clone()).await;

        let room = update_record(
            self.store.as_ref(),
            Collection::Room,
            room_id.as_str(),
            |current: Option<Room>| -> Result<(Mutation<Room>, Room), RoomError> {
                let room = current.ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;
                if &room.host_id != host_id {
                    return Err(RoomError::NotHost(room_id.clone()));
                }
                Ok((Mutation::Delete, room))
            },
        )
        .await?;

        let mut index = self.index();
        for member in &room.members {
            if index.get(member) == Some(room_id) {
                index.remove(member);
            }
        }
        drop(index);

        tracing::info!(%room_id, %host_id, "room closed by host");
        Ok(room)
    }
}

fn check_startable(room: &Room, host_id: &AccountId) -> Result<(), RoomError> {
    if &room.host_id != host_id {
        return Err(RoomError::NotHost(room.id.clone()));
    }
    if !room.status.can_transition_to(RoomStatus::InProgress) {
        return Err(RoomError::RoomNotOpen(room.id.clone()));
    }
    if room.members.len() < room.min_players {
        return Err(RoomError::NotEnoughPlayers {
            have: room.members.len(),
            need: room.min_players,
        });
    }
    Ok(())
}
