mod protocol;
mod room;
mod server;

pub use protocol::{decode_client_event, ClientEvent, ServerEvent};
pub use server::RoomServer;
