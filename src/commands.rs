// Command service: the operations a chat connector drives on behalf of
// users. Identity and permission flags arrive from the connector; this
// layer gates them, serializes each community's read-modify-write, and
// produces the reply text and image references.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::engine::board::{Board, Square};
use crate::engine::pool::ClueSet;
use crate::engine::settings::CommunitySettings;
use crate::error::{BingoError, Result};
use crate::metrics;
use crate::render::{RenderOptions, SheetFont};
use crate::store::Store;

/// How long an overwrite confirmation stays answerable.
pub const CONFIRMATION_TTL: Duration = Duration::from_secs(30);

/// Who is issuing a command. The connector resolves chat-platform roles;
/// the core only ever sees these flags.
#[derive(Debug, Clone)]
pub struct Requester {
    pub user: String,
    pub is_administrator: bool,
    pub has_designated_role: bool,
}

impl Requester {
    fn is_game_master(&self) -> bool {
        self.is_administrator || self.has_designated_role
    }
}

/// A command reply: message text, plus the path of the rendered sheet
/// when the command shows one.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Reply {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Reply {
    fn text(message: impl Into<String>) -> Reply {
        Reply {
            message: message.into(),
            image_url: None,
        }
    }

    fn with_sheet(message: impl Into<String>, community: &str, user: &str) -> Reply {
        Reply {
            message: message.into(),
            image_url: Some(format!(
                "/api/communities/{community}/boards/{user}/image"
            )),
        }
    }
}

/// Outcome of a create request: either the sheet was made, or the caller
/// must confirm an overwrite first.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(Reply),
    NeedsConfirmation { token: Uuid, prompt: String },
}

/// An unanswered overwrite question. No board bytes are written until it
/// is accepted; expiry means the request never happened.
#[derive(Debug, Clone)]
struct PendingOverwrite {
    community: String,
    requester: Requester,
    target: String,
    issued: Instant,
}

pub struct BingoService {
    store: Store,
    font: SheetFont,
    render: RenderOptions,
    pending: StdMutex<HashMap<Uuid, PendingOverwrite>>,
    // One async mutex per community serializes every command's
    // read-modify-write, including the bingo_declared check-and-set.
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl BingoService {
    pub fn new(store: Store, font: SheetFont, render: RenderOptions) -> BingoService {
        BingoService {
            store,
            font,
            render,
            pending: StdMutex::new(HashMap::new()),
            locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn font(&self) -> &SheetFont {
        &self.font
    }

    pub fn render_options(&self) -> &RenderOptions {
        &self.render
    }

    fn community_lock(&self, community: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(community.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn require_game_master(requester: &Requester) -> Result<()> {
        if requester.is_game_master() {
            Ok(())
        } else {
            Err(BingoError::PermissionDenied)
        }
    }

    /// Resolve the user a command acts on. Acting on someone else's sheet
    /// needs game-master permissions.
    fn resolve_target(requester: &Requester, target: Option<&str>) -> Result<String> {
        match target {
            Some(user) if user != requester.user => {
                Self::require_game_master(requester)?;
                Ok(user.to_string())
            }
            Some(user) => Ok(user.to_string()),
            None => Ok(requester.user.clone()),
        }
    }

    // --- Clue pool ---

    pub async fn set_clue_pool(
        &self,
        requester: &Requester,
        community: &str,
        submission: &str,
    ) -> Result<Reply> {
        Self::require_game_master(requester)?;
        let set = ClueSet::parse_submission(submission)?;

        let lock = self.community_lock(community);
        let _guard = lock.lock().await;
        self.store.save_clues(community, &set).await?;

        metrics::POOL_UPDATES_TOTAL.inc();
        tracing::info!(
            "community {community}: clue pool set to {:?} ({} clues) by {}",
            set.label,
            set.clues.len(),
            requester.user
        );
        Ok(Reply::text(format!(
            "Clues for '{}' have been updated ({} clues).",
            set.label,
            set.clues.len()
        )))
    }

    pub async fn reset_clue_pool(&self, requester: &Requester, community: &str) -> Result<Reply> {
        Self::require_game_master(requester)?;
        let set = ClueSet::default_set();

        let lock = self.community_lock(community);
        let _guard = lock.lock().await;
        self.store.save_clues(community, &set).await?;

        metrics::POOL_UPDATES_TOTAL.inc();
        Ok(Reply::text(format!(
            "Clue pool reset to the built-in '{}' set.",
            set.label
        )))
    }

    pub async fn list_clue_pool(&self, community: &str) -> Result<Reply> {
        let set = self
            .store
            .load_clues(community)
            .await?
            .ok_or(BingoError::PoolMissing)?;
        let mut message = format!("Clues for {}:\n", set.label);
        for clue in &set.clues {
            message.push_str(clue);
            message.push('\n');
        }
        Ok(Reply::text(message))
    }

    // --- Sheet creation and the overwrite confirmation protocol ---

    pub async fn create_board(
        &self,
        requester: &Requester,
        community: &str,
        target: Option<&str>,
    ) -> Result<CreateOutcome> {
        let target = Self::resolve_target(requester, target)?;

        let lock = self.community_lock(community);
        let _guard = lock.lock().await;

        let pool = self
            .store
            .load_clues(community)
            .await?
            .ok_or(BingoError::PoolMissing)?;

        // A sheet for the same round must not be silently replaced; a
        // sheet from an earlier round is fair game.
        if let Some(existing) = self.store.load_board(community, &target).await? {
            if existing.label == pool.label {
                let token = Uuid::new_v4();
                let prompt = format!(
                    "{target} already has a bingo sheet for '{}'. Reply yes to overwrite it, or no to cancel.",
                    pool.label
                );
                self.pending.lock().unwrap().insert(
                    token,
                    PendingOverwrite {
                        community: community.to_string(),
                        requester: requester.clone(),
                        target,
                        issued: Instant::now(),
                    },
                );
                metrics::PENDING_CONFIRMATIONS
                    .set(self.pending.lock().unwrap().len() as i64);
                return Ok(CreateOutcome::NeedsConfirmation { token, prompt });
            }
        }

        let reply = self.write_new_board(community, &target, &pool).await?;
        Ok(CreateOutcome::Created(reply))
    }

    /// Second phase of the overwrite protocol. Unknown and expired
    /// tokens are indistinguishable; both report a timeout, and in every
    /// non-accepted outcome the stored sheet is untouched.
    pub async fn resolve_confirmation(&self, token: Uuid, accepted: bool) -> Result<Reply> {
        let pending = {
            let mut map = self.pending.lock().unwrap();
            let entry = map.remove(&token);
            metrics::PENDING_CONFIRMATIONS.set(map.len() as i64);
            entry.ok_or(BingoError::ConfirmationTimeout)?
        };
        if pending.issued.elapsed() > CONFIRMATION_TTL {
            return Err(BingoError::ConfirmationTimeout);
        }
        if !accepted {
            return Err(BingoError::ConfirmationDeclined);
        }

        let lock = self.community_lock(&pending.community);
        let _guard = lock.lock().await;

        tracing::info!(
            "community {}: {} confirmed overwriting {}'s sheet",
            pending.community,
            pending.requester.user,
            pending.target
        );
        // The pool may have been replaced while the question was open;
        // the fresh load keeps creation consistent with what exists now.
        let pool = self
            .store
            .load_clues(&pending.community)
            .await?
            .ok_or(BingoError::PoolMissing)?;
        self.write_new_board(&pending.community, &pending.target, &pool)
            .await
    }

    /// Sample, persist, and re-arm win state. Callers hold the community
    /// lock.
    async fn write_new_board(
        &self,
        community: &str,
        target: &str,
        pool: &ClueSet,
    ) -> Result<Reply> {
        let mut settings = self.store.load_settings(community).await?;
        let mut board = Board::sample(pool, settings.free_space_enabled)?;
        if settings.free_space_enabled {
            // The free square starts crossed so lines through the center
            // can complete; see DESIGN.md.
            board.mark_free_cell();
        }
        self.store.save_board(community, target, &board).await?;
        settings.reset_bingo(target);
        self.store.save_settings(community, &settings).await?;

        metrics::BOARDS_CREATED_TOTAL.inc();
        tracing::info!("community {community}: new sheet for {target} ({})", board.label);
        Ok(Reply::with_sheet(
            format!("New bingo sheet for {target}, round '{}'.", board.label),
            community,
            target,
        ))
    }

    // --- Viewing ---

    pub async fn view_board(
        &self,
        community: &str,
        user: &str,
    ) -> Result<Reply> {
        let board = self
            .store
            .load_board(community, user)
            .await?
            .ok_or_else(|| BingoError::BoardMissing {
                user: user.to_string(),
            })?;
        Ok(Reply::with_sheet(
            format!("{user}'s bingo sheet for '{}'.", board.label),
            community,
            user,
        ))
    }

    /// Load the stored sheet for rendering. Used by the image endpoint.
    pub async fn load_board(&self, community: &str, user: &str) -> Result<Board> {
        self.store
            .load_board(community, user)
            .await?
            .ok_or_else(|| BingoError::BoardMissing {
                user: user.to_string(),
            })
    }

    // --- Marking ---

    pub async fn mark_cell(
        &self,
        requester: &Requester,
        community: &str,
        square: &str,
        target: Option<&str>,
    ) -> Result<Reply> {
        let target = Self::resolve_target(requester, target)?;
        let square = Square::parse(square)?;

        let lock = self.community_lock(community);
        let _guard = lock.lock().await;

        let mut board = self
            .store
            .load_board(community, &target)
            .await?
            .ok_or_else(|| BingoError::BoardMissing {
                user: target.clone(),
            })?;
        board.mark(square)?;
        self.store.save_board(community, &target, &board).await?;
        metrics::CELLS_MARKED_TOTAL.inc();

        let mut message = format!("Crossed off {square} on {target}'s sheet.");
        if board.check_win() {
            let mut settings = self.store.load_settings(community).await?;
            if settings.declare_bingo(&target, Utc::now()) {
                self.store.save_settings(community, &settings).await?;
                metrics::BINGOS_DECLARED_TOTAL.inc();
                tracing::info!("community {community}: BINGO for {target} ({})", board.label);
                message.push_str(&format!(
                    " BINGO! {target} completed a line on '{}'!",
                    board.label
                ));
            }
        }
        Ok(Reply::with_sheet(message, community, &target))
    }

    pub async fn unmark_cell(
        &self,
        requester: &Requester,
        community: &str,
        square: &str,
        target: Option<&str>,
    ) -> Result<Reply> {
        let target = Self::resolve_target(requester, target)?;
        let square = Square::parse(square)?;

        let lock = self.community_lock(community);
        let _guard = lock.lock().await;

        let mut board = self
            .store
            .load_board(community, &target)
            .await?
            .ok_or_else(|| BingoError::BoardMissing {
                user: target.clone(),
            })?;
        board.unmark(square)?;
        // A declared bingo stays declared; uncrossing only edits the cell.
        self.store.save_board(community, &target, &board).await?;
        metrics::CELLS_UNMARKED_TOTAL.inc();

        Ok(Reply::with_sheet(
            format!("Uncrossed {square} on {target}'s sheet."),
            community,
            &target,
        ))
    }

    // --- Settings ---

    pub async fn set_free_space(
        &self,
        requester: &Requester,
        community: &str,
        toggle: &str,
    ) -> Result<Reply> {
        Self::require_game_master(requester)?;
        let enabled = match toggle.to_ascii_lowercase().as_str() {
            "on" => true,
            "off" => false,
            other => return Err(BingoError::InvalidToggle(other.to_string())),
        };

        let lock = self.community_lock(community);
        let _guard = lock.lock().await;
        let mut settings = self.store.load_settings(community).await?;
        settings.free_space_enabled = enabled;
        self.store.save_settings(community, &settings).await?;

        Ok(Reply::text(if enabled {
            "The middle free space has been enabled."
        } else {
            "The middle free space has been disabled."
        }))
    }

    pub async fn set_required_role(
        &self,
        requester: &Requester,
        community: &str,
        role: &str,
    ) -> Result<Reply> {
        Self::require_game_master(requester)?;

        let lock = self.community_lock(community);
        let _guard = lock.lock().await;
        let mut settings = self.store.load_settings(community).await?;
        settings.required_role = role.to_string();
        self.store.save_settings(community, &settings).await?;

        Ok(Reply::text(format!(
            "The designated game-master role is now '{role}'."
        )))
    }

    pub async fn get_settings(&self, community: &str) -> Result<CommunitySettings> {
        self.store.load_settings(community).await
    }

    /// Drop expired confirmations. Answering late still reports a
    /// timeout either way; this just keeps the map and gauge honest.
    pub fn sweep_confirmations(&self) {
        let mut map = self.pending.lock().unwrap();
        map.retain(|_, pending| pending.issued.elapsed() <= CONFIRMATION_TTL);
        metrics::PENDING_CONFIRMATIONS.set(map.len() as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requester(user: &str) -> Requester {
        Requester {
            user: user.to_string(),
            is_administrator: false,
            has_designated_role: false,
        }
    }

    fn admin(user: &str) -> Requester {
        Requester {
            user: user.to_string(),
            is_administrator: true,
            has_designated_role: false,
        }
    }

    #[test]
    fn test_resolve_target_defaults_to_self() {
        let me = requester("u1");
        assert_eq!(BingoService::resolve_target(&me, None).unwrap(), "u1");
        assert_eq!(
            BingoService::resolve_target(&me, Some("u1")).unwrap(),
            "u1"
        );
    }

    #[test]
    fn test_resolve_target_cross_user_requires_permission() {
        let me = requester("u1");
        assert!(matches!(
            BingoService::resolve_target(&me, Some("u2")),
            Err(BingoError::PermissionDenied)
        ));
        assert_eq!(
            BingoService::resolve_target(&admin("u1"), Some("u2")).unwrap(),
            "u2"
        );
    }

    #[test]
    fn test_designated_role_counts_as_game_master() {
        let holder = Requester {
            user: "u1".to_string(),
            is_administrator: false,
            has_designated_role: true,
        };
        assert!(BingoService::require_game_master(&holder).is_ok());
        assert!(BingoService::require_game_master(&requester("u1")).is_err());
    }
}
