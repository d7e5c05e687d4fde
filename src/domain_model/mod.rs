mod conversation;
mod user;
mod validation;

pub use conversation::*;
pub use user::*;
pub use validation::*;
