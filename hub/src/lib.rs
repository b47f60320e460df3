//! Central controller connector for printwarden
//!
//! Reports the state of every supervised printer to the central controller
//! on a fixed cadence and applies the authorization directives the
//! controller sends back.

pub mod api;
pub mod connector;

// Re-exports
pub use api::{ControlMessage, ControlSetting, HubClient, OperationState, Report, UpdateMessage};
pub use connector::Connector;
