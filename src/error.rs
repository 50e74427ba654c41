// Error types for every user-facing command outcome.

use axum::http::StatusCode;
use thiserror::Error;

/// All the ways a bingo command can fail. Every variant except `Io` is an
/// expected, user-facing outcome with its own reply message; `Io` means a
/// persist or load failed and must reach the caller as a server error
/// rather than being reported as success.
#[derive(Debug, Error)]
pub enum BingoError {
    #[error("you need to be an administrator or hold the designated role to do that")]
    PermissionDenied,

    #[error("no clue pool has been set for this community yet")]
    PoolMissing,

    #[error("the clue pool needs at least {needed} clues, found {found}")]
    PoolTooSmall { needed: usize, found: usize },

    #[error("malformed clue submission: {0}")]
    MalformedSubmission(String),

    #[error("{user} doesn't have a bingo sheet yet")]
    BoardMissing { user: String },

    #[error("the stored bingo sheet is corrupt: {0}")]
    BoardCorrupt(String),

    #[error("invalid square {0:?}: use a column letter A-E followed by a row digit 1-5, e.g. B3")]
    InvalidSquare(String),

    #[error("square index {index} is outside the {len}-cell sheet")]
    SquareOutOfRange { index: usize, len: usize },

    #[error("that square is already crossed off")]
    AlreadyMarked,

    #[error("that square isn't crossed off")]
    NotMarked,

    #[error("the overwrite confirmation expired, sheet creation canceled")]
    ConfirmationTimeout,

    #[error("sheet creation canceled")]
    ConfirmationDeclined,

    #[error("invalid option {0:?}: use \"on\" or \"off\"")]
    InvalidToggle(String),

    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BingoError {
    /// HTTP status the API surface reports this outcome with.
    pub fn status(&self) -> StatusCode {
        match self {
            BingoError::PermissionDenied => StatusCode::FORBIDDEN,
            BingoError::PoolMissing | BingoError::BoardMissing { .. } => StatusCode::NOT_FOUND,
            BingoError::PoolTooSmall { .. }
            | BingoError::MalformedSubmission(_)
            | BingoError::InvalidSquare(_)
            | BingoError::SquareOutOfRange { .. }
            | BingoError::InvalidToggle(_)
            | BingoError::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
            BingoError::AlreadyMarked
            | BingoError::NotMarked
            | BingoError::ConfirmationDeclined => StatusCode::CONFLICT,
            BingoError::ConfirmationTimeout => StatusCode::GONE,
            BingoError::BoardCorrupt(_) | BingoError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, BingoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_messages() {
        assert_eq!(
            BingoError::PoolTooSmall {
                needed: 25,
                found: 24
            }
            .to_string(),
            "the clue pool needs at least 25 clues, found 24"
        );
        assert!(BingoError::InvalidSquare("F1".into())
            .to_string()
            .contains("F1"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(BingoError::PermissionDenied.status(), StatusCode::FORBIDDEN);
        assert_eq!(BingoError::PoolMissing.status(), StatusCode::NOT_FOUND);
        assert_eq!(BingoError::AlreadyMarked.status(), StatusCode::CONFLICT);
        assert_eq!(BingoError::ConfirmationTimeout.status(), StatusCode::GONE);
        assert_eq!(
            BingoError::Io(std::io::Error::other("disk gone")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
