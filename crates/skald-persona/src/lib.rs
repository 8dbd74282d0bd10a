pub mod persona;
pub mod ranker;

pub use persona::{resolve, Persona};
pub use ranker::{ContentRanker, RankedItem, Ranking, ScoreBreakdown};
