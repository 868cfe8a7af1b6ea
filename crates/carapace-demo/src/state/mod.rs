pub mod event_bus;
pub mod session;

pub use event_bus::*;
pub use session::*;
