use std::{
    path::PathBuf,
    process,
    time::{SystemTime, UNIX_EPOCH},
};

use clap::{Parser, Subcommand};
use log::{error, info};
use sha2::{Digest, Sha256};

use instaid_chaincode::{
    ledger::{LedgerError, WorldState},
    shim::{Chaincode, Response},
    ChaincodeConfig, KeyingScheme, UserContract,
};

mod logger;

/// Run the InstaID user chaincode against a local ledger file.
#[derive(Parser)]
#[command(name = "instaid", version)]
struct Cli {
    /// Ledger state file.
    #[arg(long, global = true, env = "INSTAID_STATE", default_value = "instaid-state.json")]
    state: PathBuf,

    /// How user records are keyed: "index" (USER<i>) or "hash" (nameHash).
    #[arg(long, global = true, env = "INSTAID_KEYING", default_value = "index")]
    keying: KeyingScheme,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Instantiate the chaincode on the ledger.
    Init,
    /// Invoke a function and commit its writes.
    Invoke {
        function: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Invoke a function without committing anything.
    Query {
        function: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Print height, state root and keys of the ledger.
    Snapshot,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("failed to render output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("state file was deployed with {deployed} keys, refusing to run with {requested} keys")]
    KeyingConflict {
        deployed: KeyingScheme,
        requested: KeyingScheme,
    },
    #[error("{0}")]
    Rejected(String),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Init,
    Invoke,
    Query,
}

struct Session {
    state_path: PathBuf,
    ledger: WorldState,
    contract: UserContract,
}

impl Session {
    fn open(state_path: PathBuf, keying: KeyingScheme) -> Result<Self, CliError> {
        let ledger = WorldState::load(&state_path)?;
        if let Some(deployed) = &ledger.meta.deployment {
            if deployed.keying != keying {
                return Err(CliError::KeyingConflict {
                    deployed: deployed.keying,
                    requested: keying,
                });
            }
        }
        Ok(Self {
            state_path,
            ledger,
            contract: UserContract::new(ChaincodeConfig::new(keying)),
        })
    }

    /// Run one transaction. Writes are committed and saved unless `mode` is
    /// a query, and only when the chaincode answered with success.
    fn execute(
        &mut self,
        mode: Mode,
        function: &str,
        args: Vec<String>,
    ) -> Result<Response, CliError> {
        let timestamp = now();
        let tx_id = transaction_id(self.ledger.meta.height, timestamp, function, &args);
        let mut ctx = self.ledger.begin(tx_id.clone(), function, args);
        let response = match mode {
            Mode::Init => self.contract.init(&mut ctx),
            Mode::Invoke | Mode::Query => self.contract.invoke(&mut ctx),
        };
        let write_set = ctx.into_write_set();

        if !response.is_ok() {
            return Err(CliError::Rejected(response.message));
        }
        if mode != Mode::Query {
            self.ledger.commit(write_set, timestamp)?;
            self.ledger.meta.deployment = Some(self.contract.config().clone());
            self.ledger.save(&self.state_path)?;
            info!(
                "committed {tx_id} at height {} to {}",
                self.ledger.meta.height,
                self.state_path.display()
            );
        }
        Ok(response)
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

fn transaction_id(height: u64, timestamp: u64, function: &str, args: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(height.to_le_bytes());
    hasher.update(timestamp.to_le_bytes());
    hasher.update(function.as_bytes());
    for arg in args {
        hasher.update([0u8]);
        hasher.update(arg.as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn print_payload(payload: &[u8]) {
    if payload.is_empty() {
        return;
    }
    match std::str::from_utf8(payload) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{}", hex::encode(payload)),
    }
}

fn snapshot_cmd(session: &Session) -> Result<(), CliError> {
    let snapshot = session.ledger.snapshot();
    let summary = serde_json::json!({
        "height": snapshot.meta.height,
        "timestamp": snapshot.meta.timestamp,
        "last_tx_id": snapshot.meta.last_tx_id,
        "deployment": snapshot.meta.deployment,
        "merkle_root": hex::encode(snapshot.merkle_root),
        "keys": snapshot.entries.keys().collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut session = Session::open(cli.state, cli.keying)?;
    match cli.command {
        Command::Init => {
            session.execute(Mode::Init, "init", Vec::new())?;
            println!(
                "instantiated ({} keys) → {}",
                cli.keying,
                session.state_path.display()
            );
        }
        Command::Invoke { function, args } => {
            let response = session.execute(Mode::Invoke, &function, args)?;
            print_payload(&response.payload);
        }
        Command::Query { function, args } => {
            let response = session.execute(Mode::Query, &function, args)?;
            print_payload(&response.payload);
        }
        Command::Snapshot => snapshot_cmd(&session)?,
    }
    Ok(())
}

fn main() {
    logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => {}
        Err(CliError::Rejected(message)) => {
            eprintln!("error: {message}");
            process::exit(1);
        }
        Err(err) => {
            error!("{err}");
            eprintln!("error: {err}");
            process::exit(2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn transaction_ids_depend_on_every_input() {
        let base = transaction_id(1, 10, "createUser", &args(&["USER1", "a"]));
        assert_eq!(base.len(), 64);
        assert_eq!(base, transaction_id(1, 10, "createUser", &args(&["USER1", "a"])));
        assert_ne!(base, transaction_id(2, 10, "createUser", &args(&["USER1", "a"])));
        assert_ne!(base, transaction_id(1, 11, "createUser", &args(&["USER1", "a"])));
        assert_ne!(base, transaction_id(1, 10, "createUser", &args(&["USER1a"])));
    }

    #[test]
    fn invoke_commits_and_query_does_not() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut session = Session::open(path.clone(), KeyingScheme::Index).unwrap();

        session
            .execute(Mode::Invoke, "createUser", args(&["USER5", "Alice", "d", "i", ""]))
            .unwrap();
        let response = session
            .execute(Mode::Query, "queryUser", args(&["USER5"]))
            .unwrap();
        assert!(response.payload.starts_with(br#"{"docType":"user""#));

        let reloaded = WorldState::load(&path).unwrap();
        assert_eq!(reloaded.meta.height, 1);
        assert!(reloaded.get("USER5").is_some());
    }

    #[test]
    fn rejected_invocation_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut session = Session::open(path.clone(), KeyingScheme::Index).unwrap();

        let err = session
            .execute(Mode::Invoke, "queryUser", args(&["USER0"]))
            .unwrap_err();
        assert!(matches!(err, CliError::Rejected(message) if message == "USER0 does not exist"));
        assert!(!path.exists());
    }

    #[test]
    fn reopening_with_other_keying_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut session = Session::open(path.clone(), KeyingScheme::NameHash).unwrap();
        session.execute(Mode::Init, "init", Vec::new()).unwrap();

        assert!(matches!(
            Session::open(path.clone(), KeyingScheme::Index),
            Err(CliError::KeyingConflict { .. })
        ));
        assert!(Session::open(path, KeyingScheme::NameHash).is_ok());
    }

    #[test]
    fn cli_parses_trailing_arguments() {
        let cli = Cli::try_parse_from([
            "instaid",
            "--keying",
            "hash",
            "invoke",
            "createUser",
            "Alice",
            "dob",
            "img",
        ])
        .unwrap();
        assert_eq!(cli.keying, KeyingScheme::NameHash);
        match cli.command {
            Command::Invoke { function, args } => {
                assert_eq!(function, "createUser");
                assert_eq!(args, vec!["Alice", "dob", "img"]);
            }
            _ => panic!("expected invoke"),
        }
    }
}
