mod auth_service;
mod conversation_service;
mod validation;

pub use auth_service::*;
pub use conversation_service::*;
pub use validation::*;
