use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ChaincodeError;

pub const DOC_TYPE: &str = "user";

/// A user as stored on the ledger.
///
/// All hashes are opaque strings computed by the client; the contract only
/// stores and compares them.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub doc_type: String,
    pub name_hash: String,
    pub dob_hash: String,
    pub image_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Fields written by other clients. Kept so a read-modify-write does not
    /// drop them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserRecord {
    pub fn new(
        name_hash: impl Into<String>,
        dob_hash: impl Into<String>,
        image_hash: impl Into<String>,
    ) -> Self {
        Self {
            doc_type: DOC_TYPE.to_string(),
            name_hash: name_hash.into(),
            dob_hash: dob_hash.into(),
            image_hash: image_hash.into(),
            owner: None,
            extra: Map::new(),
        }
    }

    /// Decode the bytes stored at `key`.
    pub fn decode(key: &str, bytes: &[u8]) -> Result<Self, ChaincodeError> {
        let record: UserRecord = serde_json::from_slice(bytes)
            .map_err(|err| ChaincodeError::parse_failure(key, err))?;
        if record.doc_type != DOC_TYPE {
            return Err(ChaincodeError::parse_failure(
                key,
                format!("docType is {:?}, expected {DOC_TYPE:?}", record.doc_type),
            ));
        }
        Ok(record)
    }

    pub fn encode(&self) -> Result<Vec<u8>, ChaincodeError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Exact comparison of the stored date-of-birth and image hashes.
    pub fn matches(&self, dob_hash: &str, image_hash: &str) -> bool {
        self.dob_hash == dob_hash && self.image_hash == image_hash
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Verification {
    pub verified: bool,
}
