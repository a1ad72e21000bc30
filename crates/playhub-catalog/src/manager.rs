//! The catalog manager: every rule about what a game record may become.
//!
//! # Write ordering
//!
//! A published version must never point at a missing artifact, so the
//! artifact always goes first:
//!
//! ```text
//! publish: write artifact ──→ create record ──(fails)──→ delete artifact
//! update:  write artifact ──→ CAS append    ──(fails)──→ delete artifact
//! ```
//!
//! When the store's answer is lost (timeout, broken connection) the write
//! may have landed anyway. The record is read back first and the artifact
//! is only deleted if the version is absent; if the read fails too the
//! artifact is kept, since an orphaned file is harmless and a dangling
//! version is not.
//!
//! Mutations of one game are serialized in-process by a per-game lock.
//! The lobby touches the same records (reviews), so every write is still a
//! compare-and-set through [`update_record`].

use std::sync::Arc;

use playhub_protocol::{
    Account, AccountId, Collection, Game, GameConfig, GameId, GameStatus, GameSummary, Review,
    VersionEntry, unix_now,
};
use playhub_store::{
    DataStore, KeyedLocks, Mutation, create_record, get_record, list_records, update_record,
};

use crate::{ArtifactStore, CatalogError, GameVersion};

/// A fetched build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub game_id: GameId,
    pub version: String,
    pub bytes: Vec<u8>,
}

pub struct CatalogManager<S: DataStore, A: ArtifactStore> {
    store: Arc<S>,
    artifacts: Arc<A>,
    game_locks: KeyedLocks<GameId>,
}

impl<S: DataStore, A: ArtifactStore> CatalogManager<S, A> {
    pub fn new(store: Arc<S>, artifacts: Arc<A>) -> Self {
        Self {
            store,
            artifacts,
            game_locks: KeyedLocks::new(),
        }
    }

    // ---------------------------------------------------------------------
    // Developer operations
    // ---------------------------------------------------------------------

    /// Publishes a new game owned by `developer_id`.
    ///
    /// # Errors
    /// [`CatalogError::InvalidConfig`] if a required field is missing or
    /// the player bounds are not `1 <= min <= max`.
    pub async fn publish(
        &self,
        developer_id: &AccountId,
        config: &GameConfig,
        artifact: &[u8],
    ) -> Result<GameId, CatalogError> {
        let checked = validate(config)?;
        let game_id = GameId::generate();
        let now = unix_now();

        let game = Game {
            id: game_id.clone(),
            developer_id: developer_id.clone(),
            name: checked.name,
            description: config.description.clone().unwrap_or_default(),
            game_type: config.game_type.clone().unwrap_or_default(),
            launch_spec: checked.launch_spec,
            min_players: checked.min_players,
            max_players: checked.max_players,
            latest_version: checked.version.to_string(),
            versions: vec![VersionEntry {
                version: checked.version.to_string(),
                release_note: String::new(),
                timestamp: now,
            }],
            rating_sum: 0,
            rating_count: 0,
            reviews: Vec::new(),
            status: GameStatus::Active,
        };

        self.artifacts
            .write(&game_id, &game.latest_version, artifact)
            .await?;
        if let Err(e) =
            create_record(self.store.as_ref(), Collection::Game, game_id.as_str(), &game).await
        {
            let e = CatalogError::from(e);
            if !self.settle_failed_write(&e, &game_id, &game.latest_version).await {
                return Err(e);
            }
        }

        tracing::info!(
            %game_id,
            %developer_id,
            name = %game.name,
            version = %game.latest_version,
            "game published"
        );
        Ok(game_id)
    }

    /// Appends a strictly newer version to a game.
    ///
    /// # Errors
    /// - [`CatalogError::PermissionDenied`] if the caller is not the owner
    /// - [`CatalogError::VersionTooOld`] unless `version > latest_version`
    /// - [`CatalogError::GameUnavailable`] if the game is archived
    /// - [`CatalogError::Artifact`] / [`CatalogError::Store`]: nothing is
    ///   left published; an artifact written for this call is deleted again
    ///   unless the record write may still have landed
    pub async fn update(
        &self,
        developer_id: &AccountId,
        game_id: &GameId,
        version: &str,
        release_note: &str,
        artifact: &[u8],
    ) -> Result<(), CatalogError> {
        let requested: GameVersion = version
            .parse()
            .map_err(|_| CatalogError::InvalidVersion(version.to_string()))?;
        let _guard = self.game_locks.lock(game_id.clone()).await;

        let game = self.details(game_id).await?;
        check_append(&game, developer_id, &requested)?;

        self.artifacts
            .write(game_id, requested.as_str(), artifact)
            .await?;

        let entry = VersionEntry {
            version: requested.to_string(),
            release_note: release_note.to_string(),
            timestamp: unix_now(),
        };
        let committed = update_record(
            self.store.as_ref(),
            Collection::Game,
            game_id.as_str(),
            |current: Option<Game>| -> Result<(Mutation<Game>, ()), CatalogError> {
                let mut game = current.ok_or_else(|| CatalogError::GameNotFound(game_id.clone()))?;
                check_append(&game, developer_id, &requested)?;
                game.latest_version = entry.version.clone();
                game.versions.push(entry.clone());
                Ok((Mutation::Write(game), ()))
            },
        )
        .await;

        if let Err(e) = committed {
            if !self.settle_failed_write(&e, game_id, requested.as_str()).await {
                return Err(e);
            }
        }
        tracing::info!(%game_id, version = %requested, "game version published");
        Ok(())
    }

    /// Archives a game. Records and artifacts stay, so rooms pinned to it
    /// keep working. Archiving an archived game is a no-op.
    pub async fn remove(
        &self,
        developer_id: &AccountId,
        game_id: &GameId,
    ) -> Result<(), CatalogError> {
        let _guard = self.game_locks.lock(game_id.clone()).await;
        update_record(
            self.store.as_ref(),
            Collection::Game,
            game_id.as_str(),
            |current: Option<Game>| -> Result<(Mutation<Game>, ()), CatalogError> {
                let mut game = current.ok_or_else(|| CatalogError::GameNotFound(game_id.clone()))?;
                if &game.developer_id != developer_id {
                    return Err(CatalogError::PermissionDenied(game_id.clone()));
                }
                if game.status == GameStatus::Archived {
                    return Ok((Mutation::Keep, ()));
                }
                game.status = GameStatus::Archived;
                Ok((Mutation::Write(game), ()))
            },
        )
        .await?;
        tracing::info!(%game_id, %developer_id, "game archived");
        Ok(())
    }

    /// Every game the developer owns, archived ones included.
    pub async fn list_by_developer(
        &self,
        developer_id: &AccountId,
    ) -> Result<Vec<GameSummary>, CatalogError> {
        Ok(self
            .games()
            .await?
            .iter()
            .filter(|g| &g.developer_id == developer_id)
            .map(Game::summary)
            .collect())
    }

    // ---------------------------------------------------------------------
    // Player-facing reads
    // ---------------------------------------------------------------------

    /// Active games only, by name.
    pub async fn list_active(&self) -> Result<Vec<GameSummary>, CatalogError> {
        Ok(self
            .games()
            .await?
            .iter()
            .filter(|g| g.is_active())
            .map(Game::summary)
            .collect())
    }

    /// The full record, archived or not.
    pub async fn details(&self, game_id: &GameId) -> Result<Game, CatalogError> {
        get_record::<Game, S>(self.store.as_ref(), Collection::Game, game_id.as_str())
            .await?
            .map(|r| r.value)
            .ok_or_else(|| CatalogError::GameNotFound(game_id.clone()))
    }

    /// Fetches a build: the latest one, or `version` if given.
    ///
    /// Archived games only serve explicitly requested versions, which is
    /// what a member of an already-pinned room asks for.
    pub async fn download(
        &self,
        game_id: &GameId,
        version: Option<&str>,
    ) -> Result<Download, CatalogError> {
        let game = self.details(game_id).await?;
        let version = match version {
            Some(v) => game
                .find_version(v)
                .ok_or_else(|| CatalogError::InvalidVersion(v.to_string()))?
                .to_string(),
            None if game.is_active() => game.latest_version.clone(),
            None => return Err(CatalogError::GameUnavailable(game_id.clone())),
        };
        let bytes = self.artifacts.read(game_id, &version).await?;
        tracing::debug!(%game_id, version, len = bytes.len(), "artifact served");
        Ok(Download {
            game_id: game_id.clone(),
            version,
            bytes,
        })
    }

    /// Records that `user_id` played `game_id`. Called when a room starts.
    pub async fn record_play(
        &self,
        user_id: &AccountId,
        game_id: &GameId,
    ) -> Result<(), CatalogError> {
        update_record(
            self.store.as_ref(),
            Collection::User,
            user_id.as_str(),
            |current: Option<Account>| -> Result<(Mutation<Account>, ()), CatalogError> {
                match current {
                    Some(mut account) if !account.played_games.contains(game_id) => {
                        account.played_games.insert(game_id.clone());
                        Ok((Mutation::Write(account), ()))
                    }
                    Some(_) => Ok((Mutation::Keep, ())),
                    None => {
                        tracing::warn!(%user_id, %game_id, "play recorded for unknown user");
                        Ok((Mutation::Keep, ()))
                    }
                }
            },
        )
        .await
    }

    /// Adds or replaces `user_id`'s review of `game_id`.
    ///
    /// A repeat review overwrites the earlier one in place; the cached
    /// `rating_sum` drops the old score before adding the new one and
    /// `rating_count` is unchanged.
    ///
    /// # Errors
    /// - [`CatalogError::NotPlayed`] without a play record
    /// - [`CatalogError::InvalidScore`] outside `1..=5`
    pub async fn submit_review(
        &self,
        user_id: &AccountId,
        game_id: &GameId,
        score: i64,
        comment: &str,
    ) -> Result<(), CatalogError> {
        let played = get_record::<Account, S>(self.store.as_ref(), Collection::User, user_id.as_str())
            .await?
            .is_some_and(|r| r.value.played_games.contains(game_id));
        if !played {
            return Err(CatalogError::NotPlayed(game_id.clone()));
        }
        let score = match u8::try_from(score) {
            Ok(s @ 1..=5) => s,
            _ => return Err(CatalogError::InvalidScore(score)),
        };

        let review = Review {
            user_id: user_id.clone(),
            score,
            comment: comment.to_string(),
            timestamp: unix_now(),
        };
        update_record(
            self.store.as_ref(),
            Collection::Game,
            game_id.as_str(),
            |current: Option<Game>| -> Result<(Mutation<Game>, ()), CatalogError> {
                let mut game = current.ok_or_else(|| CatalogError::GameNotFound(game_id.clone()))?;
                apply_review(&mut game, review.clone());
                Ok((Mutation::Write(game), ()))
            },
        )
        .await?;
        tracing::info!(%game_id, %user_id, score, "review submitted");
        Ok(())
    }

    // ---------------------------------------------------------------------

    async fn games(&self) -> Result<Vec<Game>, CatalogError> {
        let mut games: Vec<Game> = list_records(self.store.as_ref(), Collection::Game).await?;
        games.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(games)
    }

    /// Decides what a failed record write left behind. Returns `true` if
    /// the record holds `version` after all (the store's reply was lost),
    /// otherwise cleans up the artifact when that is safe and returns
    /// `false`.
    async fn settle_failed_write(&self, err: &CatalogError, game_id: &GameId, version: &str) -> bool {
        let indeterminate = matches!(err, CatalogError::Store(e) if e.is_indeterminate());
        if !indeterminate {
            self.discard_artifact(game_id, version).await;
            return false;
        }
        match get_record::<Game, S>(self.store.as_ref(), Collection::Game, game_id.as_str()).await {
            Ok(Some(record)) if record.value.has_version(version) => {
                tracing::warn!(%game_id, version, error = %err, "store reply lost but version was committed");
                true
            }
            Ok(_) => {
                self.discard_artifact(game_id, version).await;
                false
            }
            Err(e) => {
                tracing::warn!(%game_id, version, error = %e, "cannot confirm write, keeping artifact");
                false
            }
        }
    }

    async fn discard_artifact(&self, game_id: &GameId, version: &str) {
        if let Err(e) = self.artifacts.delete(game_id, version).await {
            tracing::error!(%game_id, version, error = %e, "failed to discard uncommitted artifact");
        } else {
            tracing::warn!(%game_id, version, "uncommitted artifact discarded");
        }
    }
}

struct CheckedConfig {
    name: String,
    version: GameVersion,
    launch_spec: Vec<String>,
    min_players: usize,
    max_players: usize,
}

fn validate(config: &GameConfig) -> Result<CheckedConfig, CatalogError> {
    let missing = |field: &str| CatalogError::InvalidConfig(format!("missing {field}"));

    let name = config
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| missing("name"))?;
    let raw_version = config.version.as_deref().ok_or_else(|| missing("version"))?;
    let version: GameVersion = raw_version
        .parse()
        .map_err(|_| CatalogError::InvalidConfig(format!("malformed version {raw_version:?}")))?;
    let launch_spec = config
        .launch_spec
        .clone()
        .filter(|spec| spec.iter().any(|part| !part.trim().is_empty()))
        .ok_or_else(|| missing("launch_spec"))?;
    let min = config.min_players.ok_or_else(|| missing("min_players"))?;
    let max = config.max_players.ok_or_else(|| missing("max_players"))?;
    if min < 1 || max < 1 || min > max {
        return Err(CatalogError::InvalidConfig(format!(
            "player bounds must satisfy 1 <= min <= max (got {min}..{max})"
        )));
    }

    Ok(CheckedConfig {
        name: name.to_string(),
        version,
        launch_spec,
        min_players: min as usize,
        max_players: max as usize,
    })
}

fn check_append(
    game: &Game,
    developer_id: &AccountId,
    requested: &GameVersion,
) -> Result<(), CatalogError> {
    if &game.developer_id != developer_id {
        return Err(CatalogError::PermissionDenied(game.id.clone()));
    }
    if !game.is_active() {
        return Err(CatalogError::GameUnavailable(game.id.clone()));
    }
    let too_old = match game.latest_version.parse::<GameVersion>() {
        Ok(latest) => *requested <= latest,
        Err(_) => false,
    };
    if too_old || game.has_version(requested.as_str()) {
        return Err(CatalogError::VersionTooOld {
            latest: game.latest_version.clone(),
            requested: requested.to_string(),
        });
    }
    Ok(())
}

fn apply_review(game: &mut Game, review: Review) {
    let new_score = u64::from(review.score);
    match game.reviews.iter_mut().find(|r| r.user_id == review.user_id) {
        Some(existing) => {
            game.rating_sum = game.rating_sum.saturating_sub(u64::from(existing.score));
            *existing = review;
        }
        None => {
            game.rating_count += 1;
            game.reviews.push(review);
        }
    }
    game.rating_sum += new_score;
}
