mod conversation_repo_mysql;
mod user_repo_mysql;

pub use conversation_repo_mysql::*;
pub use user_repo_mysql::*;
