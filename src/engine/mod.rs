// Game engine: sheet sampling, mark state, win detection, and the
// per-community settings that scope them.

pub mod board;
pub mod pool;
pub mod settings;
