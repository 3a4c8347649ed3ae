// Library root: season model, cache store, Sheets client, and the
// statistics engine built on top of them.

pub mod config;
pub mod season;
pub mod sheets;
pub mod stats;
pub mod store;
