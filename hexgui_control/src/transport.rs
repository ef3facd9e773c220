//! Live controller transports.
//!
//! The simulation transport lives in `hexgui_sim`; both implement
//! [`hexgui_common::transport::Connector`].

pub mod tcp;

pub use tcp::TcpConnector;
