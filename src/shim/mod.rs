//! Interface between a chaincode and the ledger hosting it.
//!
//! A host hands the chaincode a [`ChaincodeStub`] per transaction. The stub
//! exposes the invoked function with its arguments and a key-value view of
//! the world state scoped to that transaction. Ordering, endorsement and
//! commit all happen on the host side of this trait.

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Status code of a successful response.
pub const OK: u16 = 200;
/// Status code of a failed response.
pub const ERROR: u16 = 500;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("key must not be an empty string")]
    EmptyKey,
    #[error("state unavailable: {0}")]
    Unavailable(String),
}

pub trait ChaincodeStub {
    /// Identifier of the transaction this stub belongs to.
    fn tx_id(&self) -> &str;

    /// The invoked function name and its ordered string arguments.
    fn function_and_parameters(&self) -> (String, Vec<String>);

    /// Committed value at `key`, or `None` if nothing is stored there.
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, StateError>;

    /// Stage `value` at `key` for this transaction.
    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), StateError>;
}

pub trait Chaincode {
    /// Called once when the chaincode is instantiated.
    fn init(&self, stub: &mut dyn ChaincodeStub) -> Response;

    /// Called for every transaction proposal.
    fn invoke(&self, stub: &mut dyn ChaincodeStub) -> Response;
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub message: String,
    #[serde(serialize_with = "serialize_hex")]
    pub payload: Vec<u8>,
}

fn serialize_hex<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&hex::encode(value))
}

impl Response {
    pub fn success(payload: Vec<u8>) -> Self {
        Self {
            status: OK,
            message: String::new(),
            payload,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ERROR,
            message: message.into(),
            payload: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == OK
    }
}
