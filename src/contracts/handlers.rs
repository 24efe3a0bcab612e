//! Contract functions. Each one validates its arguments, then performs a
//! single read and/or write against the stub.

use log::{debug, info};

use crate::{
    config::KeyingScheme,
    contracts::user::{UserRecord, Verification},
    error::ChaincodeError,
    shim::ChaincodeStub,
};

/// `(nameHash, dobHash, imageHash)` of the records written by `initLedger`.
pub const SAMPLE_USERS: [(&str, &str, &str); 4] = [
    ("Anand", "01/01/2000", "blue"),
    ("Dan", "01/01/2001", "green"),
    ("Brady", "01/01/2002", "red"),
    ("Greg", "01/01/2003", "pink"),
];

pub fn index_key(index: usize) -> String {
    format!("USER{index}")
}

fn argument_count(function: &'static str, expected: usize, args: &[String]) -> ChaincodeError {
    ChaincodeError::ArgumentCountMismatch {
        function,
        expected,
        actual: args.len(),
    }
}

fn put_record(
    stub: &mut dyn ChaincodeStub,
    key: &str,
    record: &UserRecord,
) -> Result<(), ChaincodeError> {
    let bytes = record.encode()?;
    debug!("{}: put {key} ({} bytes)", stub.tx_id(), bytes.len());
    stub.put_state(key, bytes)?;
    Ok(())
}

pub fn init_ledger(
    stub: &mut dyn ChaincodeStub,
    keying: KeyingScheme,
) -> Result<Vec<u8>, ChaincodeError> {
    info!("initLedger: start ({keying} keys)");
    for (index, (name_hash, dob_hash, image_hash)) in SAMPLE_USERS.iter().enumerate() {
        let record = UserRecord::new(*name_hash, *dob_hash, *image_hash);
        let key = match keying {
            KeyingScheme::Index => index_key(index),
            KeyingScheme::NameHash => record.name_hash.clone(),
        };
        put_record(stub, &key, &record)?;
        info!("initLedger: added {key} -> {record:?}");
    }
    info!("initLedger: end");
    Ok(Vec::new())
}

pub fn create_user(
    stub: &mut dyn ChaincodeStub,
    keying: KeyingScheme,
    args: &[String],
) -> Result<Vec<u8>, ChaincodeError> {
    info!("createUser: start");
    let (key, record) = match (keying, args) {
        // The fifth argument is part of the calling convention but not stored.
        (KeyingScheme::Index, [key, name_hash, dob_hash, image_hash, _reserved]) => (
            key.clone(),
            UserRecord::new(name_hash, dob_hash, image_hash),
        ),
        (KeyingScheme::Index, _) => return Err(argument_count("createUser", 5, args)),
        (KeyingScheme::NameHash, [name_hash, dob_hash, image_hash]) => (
            name_hash.clone(),
            UserRecord::new(name_hash, dob_hash, image_hash),
        ),
        (KeyingScheme::NameHash, _) => return Err(argument_count("createUser", 3, args)),
    };
    put_record(stub, &key, &record)?;
    info!("createUser: end ({key})");
    Ok(Vec::new())
}

/// Returns the stored bytes at the given key untouched.
pub fn query_user(
    stub: &mut dyn ChaincodeStub,
    args: &[String],
) -> Result<Vec<u8>, ChaincodeError> {
    let [key] = args else {
        return Err(argument_count("queryUser", 1, args));
    };
    match stub.get_state(key)? {
        Some(bytes) if !bytes.is_empty() => {
            debug!("queryUser: {key} -> {}", String::from_utf8_lossy(&bytes));
            Ok(bytes)
        }
        _ => Err(ChaincodeError::KeyNotFound(key.clone())),
    }
}

/// Checks the supplied hashes against the record stored under `nameHash`.
pub fn verify_user(
    stub: &mut dyn ChaincodeStub,
    args: &[String],
) -> Result<Vec<u8>, ChaincodeError> {
    let [name_hash, dob_hash, image_hash] = args else {
        return Err(argument_count("queryUser", 3, args));
    };
    let bytes = match stub.get_state(name_hash)? {
        Some(bytes) if !bytes.is_empty() => bytes,
        _ => return Err(ChaincodeError::KeyNotFound(name_hash.clone())),
    };
    let record = UserRecord::decode(name_hash, &bytes)?;
    if !record.matches(dob_hash, image_hash) {
        return Err(ChaincodeError::VerificationMismatch(name_hash.clone()));
    }
    Ok(serde_json::to_vec(&Verification { verified: true })?)
}

pub fn change_user_owner(
    stub: &mut dyn ChaincodeStub,
    args: &[String],
) -> Result<Vec<u8>, ChaincodeError> {
    info!("changeUserOwner: start");
    let [key, new_owner] = args else {
        return Err(argument_count("changeUserOwner", 2, args));
    };
    let bytes = stub
        .get_state(key)?
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| ChaincodeError::parse_failure(key, "no record stored"))?;
    let mut record = UserRecord::decode(key, &bytes)?;
    record.owner = Some(new_owner.clone());
    put_record(stub, key, &record)?;
    info!("changeUserOwner: end ({key} -> {new_owner})");
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::{
        contracts::UserContract,
        shim::{Chaincode, StateError},
    };

    /// Accepts `capacity` writes, then reports the state as unavailable.
    struct FailingStub {
        capacity: usize,
        written: BTreeMap<String, Vec<u8>>,
    }

    impl FailingStub {
        fn new(capacity: usize) -> Self {
            Self {
                capacity,
                written: BTreeMap::new(),
            }
        }
    }

    impl ChaincodeStub for FailingStub {
        fn tx_id(&self) -> &str {
            "tx-failing"
        }

        fn function_and_parameters(&self) -> (String, Vec<String>) {
            ("initLedger".to_string(), Vec::new())
        }

        fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, StateError> {
            Ok(self.written.get(key).cloned())
        }

        fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), StateError> {
            if self.written.len() == self.capacity {
                return Err(StateError::Unavailable("down".to_string()));
            }
            self.written.insert(key.to_string(), value);
            Ok(())
        }
    }

    #[test]
    fn failing_write_stops_init_ledger() {
        let mut stub = FailingStub::new(2);
        let err = init_ledger(&mut stub, KeyingScheme::Index).unwrap_err();
        assert!(matches!(
            err,
            ChaincodeError::State(StateError::Unavailable(ref reason)) if reason == "down"
        ));
        let keys: Vec<&str> = stub.written.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["USER0", "USER1"]);
    }

    #[test]
    fn failing_write_becomes_error_response() {
        let mut stub = FailingStub::new(0);
        let response = UserContract::default().invoke(&mut stub);
        assert!(!response.is_ok());
        assert_eq!(response.message, "state access failed: state unavailable: down");
        assert!(stub.written.is_empty());
    }

    #[test]
    fn change_owner_reads_before_writing() {
        let mut stub = FailingStub::new(1);
        let created: Vec<String> = ["USER4", "Ada", "d", "i", ""].map(String::from).to_vec();
        create_user(&mut stub, KeyingScheme::Index, &created).unwrap();

        let err = change_user_owner(&mut stub, &["USER4".to_string(), "Tom".to_string()])
            .unwrap_err();
        assert!(matches!(err, ChaincodeError::State(StateError::Unavailable(_))));
        let stored = UserRecord::decode("USER4", &stub.written["USER4"]).unwrap();
        assert_eq!(stored.owner, None);
    }
}
