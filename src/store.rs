// File-backed persistence, one directory per community:
//
//   <root>/communities/<community>/clues.txt
//   <root>/communities/<community>/settings.json
//   <root>/communities/<community>/sheets/<user>.txt
//
// Writes are last-write-wins; callers serialize per-community mutation.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::engine::board::Board;
use crate::engine::pool::ClueSet;
use crate::engine::settings::CommunitySettings;
use crate::error::{BingoError, Result};

const CLUES_FILE: &str = "clues.txt";
const SETTINGS_FILE: &str = "settings.json";
const SHEETS_DIR: &str = "sheets";

/// Opaque chat-platform ids become path components, so they are held to a
/// strict shape before any filesystem access.
fn validate_id(id: &str) -> Result<()> {
    let ok = !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(BingoError::InvalidIdentifier(id.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Store {
        Store { root: root.into() }
    }

    fn community_dir(&self, community: &str) -> Result<PathBuf> {
        validate_id(community)?;
        Ok(self.root.join("communities").join(community))
    }

    fn sheet_path(&self, community: &str, user: &str) -> Result<PathBuf> {
        validate_id(user)?;
        Ok(self
            .community_dir(community)?
            .join(SHEETS_DIR)
            .join(format!("{user}.txt")))
    }

    /// Read a file, mapping "not found" to None.
    async fn read_optional(path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, contents).await?;
        Ok(())
    }

    // --- Clue pool ---

    pub async fn load_clues(&self, community: &str) -> Result<Option<ClueSet>> {
        let path = self.community_dir(community)?.join(CLUES_FILE);
        match Self::read_optional(&path).await? {
            Some(text) => Ok(Some(ClueSet::from_sheet(&text)?)),
            None => Ok(None),
        }
    }

    pub async fn save_clues(&self, community: &str, set: &ClueSet) -> Result<()> {
        let path = self.community_dir(community)?.join(CLUES_FILE);
        Self::write(&path, &set.to_sheet()).await
    }

    // --- Settings ---

    /// Missing or undecodable settings fall back to defaults; a broken
    /// toggle file must never block play.
    pub async fn load_settings(&self, community: &str) -> Result<CommunitySettings> {
        let path = self.community_dir(community)?.join(SETTINGS_FILE);
        match Self::read_optional(&path).await? {
            Some(text) => match serde_json::from_str(&text) {
                Ok(settings) => Ok(settings),
                Err(e) => {
                    tracing::warn!("unreadable settings for community {community}: {e}");
                    Ok(CommunitySettings::default())
                }
            },
            None => Ok(CommunitySettings::default()),
        }
    }

    pub async fn save_settings(
        &self,
        community: &str,
        settings: &CommunitySettings,
    ) -> Result<()> {
        let path = self.community_dir(community)?.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
        Self::write(&path, &json).await
    }

    // --- Sheets ---

    pub async fn load_board(&self, community: &str, user: &str) -> Result<Option<Board>> {
        let path = self.sheet_path(community, user)?;
        match Self::read_optional(&path).await? {
            Some(text) => Ok(Some(Board::from_sheet(&text)?)),
            None => Ok(None),
        }
    }

    pub async fn save_board(&self, community: &str, user: &str, board: &Board) -> Result<()> {
        let path = self.sheet_path(community, user)?;
        Self::write(&path, &board.to_sheet()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::board::{Square, BOARD_CELLS};

    fn temp_store() -> Store {
        let dir = std::env::temp_dir().join(format!("bingo-store-{}", uuid::Uuid::new_v4()));
        Store::new(dir)
    }

    fn full_pool() -> ClueSet {
        ClueSet {
            label: "Round One".to_string(),
            clues: (0..30).map(|i| format!("clue {i}")).collect(),
        }
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("123456789").is_ok());
        assert!(validate_id("guild_A-1").is_ok());
        assert!(validate_id("").is_err());
        assert!(validate_id("../escape").is_err());
        assert!(validate_id("a/b").is_err());
        assert!(validate_id("dot.name").is_err());
        assert!(validate_id(&"x".repeat(65)).is_err());
    }

    #[tokio::test]
    async fn test_missing_files_load_as_absent_or_default() {
        let store = temp_store();
        assert!(store.load_clues("g1").await.unwrap().is_none());
        assert!(store.load_board("g1", "u1").await.unwrap().is_none());
        assert_eq!(
            store.load_settings("g1").await.unwrap(),
            CommunitySettings::default()
        );
    }

    #[tokio::test]
    async fn test_clues_round_trip() {
        let store = temp_store();
        let pool = full_pool();
        store.save_clues("g1", &pool).await.unwrap();
        assert_eq!(store.load_clues("g1").await.unwrap(), Some(pool));
    }

    #[tokio::test]
    async fn test_board_round_trip_preserves_marks() {
        let store = temp_store();
        let mut board = Board::sample(&full_pool(), false).unwrap();
        board.mark(Square::parse("B3").unwrap()).unwrap();
        store.save_board("g1", "u1", &board).await.unwrap();

        let loaded = store.load_board("g1", "u1").await.unwrap().unwrap();
        assert_eq!(loaded, board);
        assert_eq!(loaded.cells().len(), BOARD_CELLS);
    }

    #[tokio::test]
    async fn test_boards_are_per_user_and_per_community() {
        let store = temp_store();
        let board_a = Board::sample(&full_pool(), false).unwrap();
        let board_b = Board::sample(&full_pool(), true).unwrap();
        store.save_board("g1", "u1", &board_a).await.unwrap();
        store.save_board("g2", "u1", &board_b).await.unwrap();

        assert_eq!(store.load_board("g1", "u1").await.unwrap(), Some(board_a));
        assert_eq!(store.load_board("g2", "u1").await.unwrap(), Some(board_b));
        assert!(store.load_board("g1", "u2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_settings_round_trip() {
        let store = temp_store();
        let mut settings = CommunitySettings::default();
        settings.free_space_enabled = true;
        settings.declare_bingo("u1", chrono::Utc::now());

        store.save_settings("g1", &settings).await.unwrap();
        assert_eq!(store.load_settings("g1").await.unwrap(), settings);
    }

    #[tokio::test]
    async fn test_corrupt_settings_fall_back_to_defaults() {
        let store = temp_store();
        let path = store.community_dir("g1").unwrap().join(SETTINGS_FILE);
        Store::write(&path, "{not json").await.unwrap();
        assert_eq!(
            store.load_settings("g1").await.unwrap(),
            CommunitySettings::default()
        );
    }

    #[tokio::test]
    async fn test_corrupt_board_is_rejected() {
        let store = temp_store();
        let path = store.sheet_path("g1", "u1").unwrap();
        Store::write(&path, "# Round One\nonly\nthree\nclues\n")
            .await
            .unwrap();
        assert!(matches!(
            store.load_board("g1", "u1").await,
            Err(BingoError::BoardCorrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_identifiers_never_touch_disk() {
        let store = temp_store();
        assert!(matches!(
            store.load_board("../../etc", "u1").await,
            Err(BingoError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            store.load_board("g1", "..").await,
            Err(BingoError::InvalidIdentifier(_))
        ));
    }
}
