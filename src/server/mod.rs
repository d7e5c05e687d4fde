mod event_consumer_impl;
mod event_publisher_impl;
mod port;
mod server;
mod validation_client;
mod validation_responder;

pub use event_consumer_impl::*;
pub use event_publisher_impl::*;
pub use port::*;
pub use server::*;
pub use validation_client::*;
pub use validation_responder::*;
