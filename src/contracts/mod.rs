use std::fmt;

use log::{info, warn};

use crate::{
    config::{ChaincodeConfig, KeyingScheme},
    error::ChaincodeError,
    shim::{Chaincode, ChaincodeStub, Response},
};

pub mod handlers;
pub mod user;

pub use user::{UserRecord, Verification};

/// Functions a client can invoke by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Function {
    InitLedger,
    CreateUser,
    QueryUser,
    ChangeUserOwner,
}

impl Function {
    pub const ALL: [Function; 4] = [
        Function::InitLedger,
        Function::CreateUser,
        Function::QueryUser,
        Function::ChangeUserOwner,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Function::InitLedger => "initLedger",
            Function::CreateUser => "createUser",
            Function::QueryUser => "queryUser",
            Function::ChangeUserOwner => "changeUserOwner",
        }
    }

    /// Whether a deployment keyed by `keying` registers this function.
    pub fn is_registered(&self, keying: KeyingScheme) -> bool {
        match self {
            Function::ChangeUserOwner => keying == KeyingScheme::Index,
            _ => true,
        }
    }

    pub fn resolve(name: &str, keying: KeyingScheme) -> Result<Self, ChaincodeError> {
        Self::ALL
            .into_iter()
            .find(|function| function.name() == name && function.is_registered(keying))
            .ok_or_else(|| ChaincodeError::UnknownFunction(name.to_string()))
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The user-record chaincode.
///
/// Holds nothing but its deployment settings; every call receives the state
/// it works on through the stub.
#[derive(Clone, Debug, Default)]
pub struct UserContract {
    config: ChaincodeConfig,
}

impl UserContract {
    pub fn new(config: ChaincodeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChaincodeConfig {
        &self.config
    }

    pub fn call(
        &self,
        stub: &mut dyn ChaincodeStub,
        function: Function,
        args: &[String],
    ) -> Result<Vec<u8>, ChaincodeError> {
        let keying = self.config.keying;
        match function {
            Function::InitLedger => handlers::init_ledger(stub, keying),
            Function::CreateUser => handlers::create_user(stub, keying, args),
            Function::QueryUser => match keying {
                KeyingScheme::Index => handlers::query_user(stub, args),
                KeyingScheme::NameHash => handlers::verify_user(stub, args),
            },
            Function::ChangeUserOwner => handlers::change_user_owner(stub, args),
        }
    }

    /// Resolve the function named by the stub and run it.
    pub fn dispatch(&self, stub: &mut dyn ChaincodeStub) -> Result<Vec<u8>, ChaincodeError> {
        let (name, params) = stub.function_and_parameters();
        info!("{}: invoke {name} {params:?}", stub.tx_id());
        let function = Function::resolve(&name, self.config.keying)?;
        self.call(stub, function, &params)
    }
}

impl Chaincode for UserContract {
    fn init(&self, stub: &mut dyn ChaincodeStub) -> Response {
        info!(
            "{}: instantiated user chaincode ({} keys)",
            stub.tx_id(),
            self.config.keying
        );
        Response::success(Vec::new())
    }

    fn invoke(&self, stub: &mut dyn ChaincodeStub) -> Response {
        match self.dispatch(stub) {
            Ok(payload) => Response::success(payload),
            Err(err) => {
                warn!("{}: {err}", stub.tx_id());
                Response::error(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::WorldState;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn resolve_honours_the_deployment_registry() {
        assert_eq!(
            Function::resolve("changeUserOwner", KeyingScheme::Index).unwrap(),
            Function::ChangeUserOwner
        );
        assert!(matches!(
            Function::resolve("changeUserOwner", KeyingScheme::NameHash),
            Err(ChaincodeError::UnknownFunction(name)) if name == "changeUserOwner"
        ));
        for function in [Function::InitLedger, Function::CreateUser, Function::QueryUser] {
            assert_eq!(
                Function::resolve(function.name(), KeyingScheme::NameHash).unwrap(),
                function
            );
        }
    }

    #[test]
    fn resolve_is_case_sensitive() {
        assert!(Function::resolve("queryuser", KeyingScheme::Index).is_err());
        assert!(Function::resolve("", KeyingScheme::Index).is_err());
    }

    #[test]
    fn unknown_function_becomes_error_response() {
        let ledger = WorldState::new();
        let contract = UserContract::default();
        let mut ctx = ledger.begin("tx-1", "deleteUser", args(&["USER0"]));
        let response = contract.invoke(&mut ctx);
        assert!(!response.is_ok());
        assert_eq!(response.message, "Received unknown function deleteUser invocation");
        assert!(ctx.writes().is_empty());
    }

    #[test]
    fn handler_failure_becomes_error_response() {
        let ledger = WorldState::new();
        let contract = UserContract::default();
        let mut ctx = ledger.begin("tx-1", "createUser", args(&["USER0", "Alice"]));
        let response = contract.invoke(&mut ctx);
        assert!(!response.is_ok());
        assert!(response.message.contains("Expecting 5, got 2"));
    }

    #[test]
    fn write_only_functions_return_empty_payload() {
        let ledger = WorldState::new();
        let contract = UserContract::default();
        let mut ctx = ledger.begin("tx-1", "initLedger", vec![]);
        let response = contract.invoke(&mut ctx);
        assert!(response.is_ok());
        assert!(response.payload.is_empty());
        assert_eq!(ctx.writes().len(), 4);
    }

    #[test]
    fn init_touches_no_state() {
        let ledger = WorldState::new();
        let contract = UserContract::new(ChaincodeConfig::new(KeyingScheme::NameHash));
        let mut ctx = ledger.begin("tx-0", "init", vec![]);
        assert!(contract.init(&mut ctx).is_ok());
        assert!(ctx.writes().is_empty());
    }

    #[test]
    fn empty_key_surfaces_state_error() {
        let ledger = WorldState::new();
        let contract = UserContract::default();
        let mut ctx = ledger.begin("tx-1", "queryUser", args(&[""]));
        let err = contract.dispatch(&mut ctx).unwrap_err();
        assert!(matches!(err, ChaincodeError::State(_)));
    }
}
