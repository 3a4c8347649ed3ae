// Statistics engine: leaderboards and player lookups over a season store.

pub mod lookup;
pub mod ranking;
