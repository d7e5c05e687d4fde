// store

mod token_store;

pub use token_store::*;

// repo

mod conversation_repo;
mod user_repo;

pub use conversation_repo::*;
pub use user_repo::*;
