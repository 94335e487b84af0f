#![forbid(unsafe_code)]

pub mod config;
pub mod connection;
pub mod error;
pub mod reconnect;
pub mod secret;
pub mod ticket;
pub mod transport;

pub use config::ConnectionConfig;
pub use connection::{ConnectionEvent, ConnectionHandle, ConnectionManager, InboundSink};
pub use error::ClientCoreError;
pub use reconnect::ReconnectPolicy;
pub use secret::SecretString;
pub use ticket::{SharedTicket, TicketClient, TicketGrant, spawn_ticket_refresher};
pub use transport::{Transport, TransportEvent, TransportEventTx, WsTransport};
