mod auth_service_impl;
mod conversation_service_impl;
mod token_manager_impl;

pub use auth_service_impl::*;
pub use conversation_service_impl::*;
pub use token_manager_impl::*;
