//! InstaID user-record chaincode.
//!
//! The crate is split into a handful of small modules:
//!
//! * [`shim`]: the state-access interface a host ledger injects into every
//!   invocation, plus the [`shim::Chaincode`] entry point and its
//!   [`shim::Response`] type.
//! * [`contracts`]: the user contract, a dispatcher over a closed set of
//!   functions and the handlers that read and write user records.
//! * [`ledger`]: an in-memory world state that hosts the chaincode one
//!   transaction at a time, used by the CLI and the tests.
//! * [`config`]: deployment settings, most importantly the keying scheme.
//!
//! The contract never talks to the ledger directly; everything goes through
//! the stub, so the same contract runs against the emulator here or a real
//! peer elsewhere.

pub mod config;
pub mod contracts;
pub mod ledger;
pub mod shim;

mod error;

pub use config::{ChaincodeConfig, KeyingScheme};
pub use contracts::UserContract;
pub use error::ChaincodeError;
