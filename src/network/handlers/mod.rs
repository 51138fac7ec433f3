// Payload handlers invoked for every relayed payload

pub mod payload_handler;
pub mod traffic;

pub use payload_handler::{FnHandler, HandlerError, HandlerRegistry, InvocationReport, PayloadHandler};
pub use traffic::TrafficLogger;
