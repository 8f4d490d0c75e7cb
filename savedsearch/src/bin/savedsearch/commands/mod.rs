pub mod query;
pub mod saved;
pub mod search;
