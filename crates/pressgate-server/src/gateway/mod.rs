//! The update-serving protocol.
//!
//! Raw query parameters are turned into a typed [`GatewayRequest`] before
//! anything else happens; [`UpdateGateway`] then authenticates, consults the
//! catalog and returns one [`GatewayOutcome`].

mod outcome;
mod request;
mod service;


pub use crate::error::GatewayError;
pub use outcome::{GatewayOutcome, PackageRef};
pub use request::{AuthRequest, GatewayRequest, PackageCheckRequest, RequestRejection};
pub use service::{Caller, StorageRoots, UpdateGateway};
