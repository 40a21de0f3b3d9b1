pub mod connection;
pub mod handler;
pub mod presence;
pub mod types;

pub use connection::{ConnectionManager, Delivery, WsSender};
pub use handler::ws_handler;
pub use presence::PresenceStore;
