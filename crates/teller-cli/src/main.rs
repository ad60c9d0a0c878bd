//! Teller CLI - encrypted account and credential store
//!
//! Command-line interface over the core library: account CRUD, password
//! changes, and verification against an age-encrypted store file.

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use comfy_table::Table;
use dialoguer::Password;

use teller_core::crypto::{CredentialHasher, HashParams};
use teller_core::storage::{AccountPatch, AccountStore, AccountUpdate, AgeSqliteStore, NewAccount};
use teller_core::{AccountService, Result, TellerError, VERSION};

/// Teller - encrypted account and credential store
#[derive(Parser)]
#[command(name = "teller")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the store file
    #[arg(short, long, global = true, env = "TELLER_STORE")]
    store: Option<PathBuf>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new encrypted store
    Init {
        /// Path where the store will be created (falls back to --store)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },

    /// Create an account with an initial password
    Create {
        /// Account id
        #[arg(value_name = "ID")]
        id: i64,

        /// Holder's full name
        #[arg(long)]
        name: String,

        /// Contact email (whitelisted domain)
        #[arg(long)]
        email: String,

        /// Contact phone number, e.g. "+31 612345678"
        #[arg(long)]
        phone: Option<String>,

        /// Account type: student, shared, youth, young_adult
        #[arg(long = "type")]
        account_type: Option<String>,
    },

    /// Show a single account
    Show {
        #[arg(value_name = "ID")]
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List all accounts
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace an account's contact fields
    Update {
        #[arg(value_name = "ID")]
        id: i64,

        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long = "type")]
        account_type: Option<String>,
    },

    /// Partially update an account from KEY=VALUE pairs
    ///
    /// Keys use the wire names: fullName, email, phoneNumber, accountType.
    Patch {
        #[arg(value_name = "ID")]
        id: i64,

        /// Fields to change, e.g. email=alice@gmail.com
        #[arg(value_name = "KEY=VALUE", required = true)]
        fields: Vec<String>,
    },

    /// Delete an account and all of its credentials
    Delete {
        #[arg(value_name = "ID")]
        id: i64,
    },

    /// Change an account's password
    Passwd {
        #[arg(value_name = "ID")]
        id: i64,
    },

    /// Verify a password attempt for an account
    Verify {
        #[arg(value_name = "ID")]
        id: i64,
    },

    /// List an account's stored credentials (newest first)
    Credentials {
        #[arg(value_name = "ID")]
        id: i64,
    },

    /// Check store integrity
    Check,

    /// Generate shell completions
    Completions {
        #[arg(value_name = "SHELL")]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let command = match cli.command {
        Some(command) => command,
        None => {
            print_quickstart();
            return;
        }
    };

    match run(command, cli.store, cli.quiet) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Error: {}", err);
            std::process::exit(exit_code(&err));
        }
    }
}

fn run(command: Commands, store: Option<PathBuf>, quiet: bool) -> Result<i32> {
    match command {
        Commands::Init { path } => {
            let path = path.or(store).ok_or_else(missing_store_error)?;
            let passphrase = resolve_passphrase(true)?;
            let store_id = AgeSqliteStore::create(&path, &passphrase)?;
            if !quiet {
                println!("Created store at {} (store id {})", path.display(), store_id);
            }
            Ok(0)
        }

        Commands::Create {
            id,
            name,
            email,
            phone,
            account_type,
        } => {
            let path = require_store(store)?;
            let mut account = NewAccount::new(id, name, email);
            if let Some(phone) = phone {
                account = account.with_phone_number(phone);
            }
            if let Some(raw) = account_type {
                account = account.with_account_type(raw.parse()?);
            }

            let mut service = open_service(&path)?;
            let password = resolve_account_password(true)?;
            service.create_account(&account, &password)?;
            service.into_store().close()?;
            if !quiet {
                println!("Account {} created.", id);
            }
            Ok(0)
        }

        Commands::Show { id, json } => {
            let path = require_store(store)?;
            let db = open_store(&path)?;
            let account = db
                .get_account(id)?
                .ok_or(TellerError::AccountNotFound(id))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&account)?);
            } else {
                print_account(&account);
            }
            Ok(0)
        }

        Commands::List { json } => {
            let path = require_store(store)?;
            let db = open_store(&path)?;
            let accounts = db.list_accounts()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&accounts)?);
            } else if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                let mut table = Table::new();
                table.set_header(vec!["ID", "Name", "Email", "Phone", "Type", "Created"]);
                for account in &accounts {
                    table.add_row(vec![
                        account.id.to_string(),
                        account.full_name.clone(),
                        account.email.clone(),
                        account.phone_number.clone().unwrap_or_default(),
                        account
                            .account_type
                            .map(|t| t.to_string())
                            .unwrap_or_default(),
                        account.created_at.to_rfc3339(),
                    ]);
                }
                println!("{table}");
            }
            Ok(0)
        }

        Commands::Update {
            id,
            name,
            email,
            phone,
            account_type,
        } => {
            let path = require_store(store)?;
            let update = AccountUpdate {
                full_name: name,
                email,
                phone_number: phone,
                account_type: account_type.map(|raw| raw.parse()).transpose()?,
            };

            let mut service = open_service(&path)?;
            service.update_account(id, &update)?;
            service.into_store().close()?;
            if !quiet {
                println!("Account {} updated.", id);
            }
            Ok(0)
        }

        Commands::Patch { id, fields } => {
            let path = require_store(store)?;
            let patch = AccountPatch::from_map(&parse_patch_fields(&fields)?)?;

            let mut service = open_service(&path)?;
            service.patch_account(id, &patch)?;
            service.into_store().close()?;
            if !quiet {
                println!("Account {} patched.", id);
            }
            Ok(0)
        }

        Commands::Delete { id } => {
            let path = require_store(store)?;
            let mut service = open_service(&path)?;
            service.delete_account(id)?;
            service.into_store().close()?;
            if !quiet {
                println!("Account {} deleted.", id);
            }
            Ok(0)
        }

        Commands::Passwd { id } => {
            let path = require_store(store)?;
            let mut service = open_service(&path)?;
            let password = resolve_account_password(true)?;
            service.change_password(id, &password)?;
            service.into_store().close()?;
            if !quiet {
                println!("Password for account {} changed.", id);
            }
            Ok(0)
        }

        Commands::Verify { id } => {
            let path = require_store(store)?;
            let service = open_service(&path)?;
            let password = resolve_account_password(false)?;
            if service.authenticate(id, &password)? {
                if !quiet {
                    println!("Password verified.");
                }
                Ok(0)
            } else {
                // Same message whether the account is unknown or the
                // password is wrong.
                eprintln!("Authentication failed.");
                Ok(1)
            }
        }

        Commands::Credentials { id } => {
            let path = require_store(store)?;
            let db = open_store(&path)?;
            if db.get_account(id)?.is_none() {
                return Err(TellerError::AccountNotFound(id));
            }
            let history = db.credential_history(id)?;
            let mut table = Table::new();
            table.set_header(vec!["ID", "Created", "Secret (base64)"]);
            for credential in &history {
                table.add_row(vec![
                    credential.id.to_string(),
                    credential.created_at.to_rfc3339(),
                    STANDARD.encode(&credential.secret),
                ]);
            }
            println!("{table}");
            Ok(0)
        }

        Commands::Check => {
            let path = require_store(store)?;
            let db = open_store(&path)?;
            match db.check_integrity() {
                Ok(()) => {
                    println!("Integrity check: OK");
                    Ok(0)
                }
                Err(err) => {
                    eprintln!("Integrity check: FAILED");
                    eprintln!("Hint: restore the store from a backup, or reset affected credentials with 'teller passwd'");
                    Err(err)
                }
            }
        }

        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "teller", &mut io::stdout());
            Ok(0)
        }
    }
}

fn print_quickstart() {
    println!("Teller - encrypted account and credential store");
    println!();
    println!("Quickstart:");
    println!("  teller init accounts.teller");
    println!("  teller create 1 --name \"Alice Example\" --email alice@gmail.com --store accounts.teller");
    println!("  teller show 1 --store accounts.teller");
    println!("  teller verify 1 --store accounts.teller");
    println!();
    println!("Set TELLER_STORE and TELLER_PASSPHRASE to avoid repeating flags.");
    println!("Run 'teller --help' for all commands.");
}

fn missing_store_error() -> TellerError {
    TellerError::InvalidInput(
        "No store specified. Pass --store or set TELLER_STORE".to_string(),
    )
}

fn require_store(store: Option<PathBuf>) -> Result<PathBuf> {
    store.ok_or_else(missing_store_error)
}

fn open_store(path: &Path) -> Result<AgeSqliteStore> {
    let passphrase = resolve_passphrase(false)?;
    AgeSqliteStore::open(path, &passphrase)
}

fn open_service(path: &Path) -> Result<AccountService<AgeSqliteStore>> {
    let store = open_store(path)?;
    let hasher = CredentialHasher::new(HashParams::RECOMMENDED)?;
    Ok(AccountService::new(store, hasher))
}

/// Store passphrase from `TELLER_PASSPHRASE`, or an interactive prompt.
fn resolve_passphrase(confirm: bool) -> Result<String> {
    if let Ok(passphrase) = std::env::var("TELLER_PASSPHRASE") {
        return Ok(passphrase);
    }
    prompt_secret("Store passphrase", "TELLER_PASSPHRASE", confirm)
}

/// Account password from `TELLER_ACCOUNT_PASSWORD`, or an interactive prompt.
fn resolve_account_password(confirm: bool) -> Result<String> {
    if let Ok(password) = std::env::var("TELLER_ACCOUNT_PASSWORD") {
        return Ok(password);
    }
    prompt_secret("Account password", "TELLER_ACCOUNT_PASSWORD", confirm)
}

fn prompt_secret(prompt: &str, env_hint: &str, confirm: bool) -> Result<String> {
    if !io::stdin().is_terminal() {
        return Err(TellerError::InvalidInput(format!(
            "{} is required when not running interactively",
            env_hint
        )));
    }

    let mut input = Password::new().with_prompt(prompt);
    if confirm {
        input = input.with_confirmation(format!("Confirm {}", prompt.to_lowercase()), "Values do not match");
    }
    input
        .interact()
        .map_err(|e| TellerError::InvalidInput(format!("Failed to read {}: {}", prompt, e)))
}

fn parse_patch_fields(fields: &[String]) -> Result<serde_json::Map<String, serde_json::Value>> {
    let mut map = serde_json::Map::new();
    for field in fields {
        let (key, value) = field.split_once('=').ok_or_else(|| {
            TellerError::InvalidInput(format!("Expected KEY=VALUE, got: {}", field))
        })?;
        map.insert(
            key.to_string(),
            serde_json::Value::String(value.to_string()),
        );
    }
    Ok(map)
}

fn print_account(account: &teller_core::storage::Account) {
    println!("Account {}", account.id);
    println!("  Name:    {}", account.full_name);
    println!("  Email:   {}", account.email);
    println!(
        "  Phone:   {}",
        account.phone_number.as_deref().unwrap_or("-")
    );
    println!(
        "  Type:    {}",
        account
            .account_type
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!("  Created: {}", account.created_at.to_rfc3339());
    println!("  Updated: {}", account.updated_at.to_rfc3339());
}

fn exit_code(err: &TellerError) -> i32 {
    match err {
        TellerError::StoreNotFound | TellerError::AccountNotFound(_) => 3,
        TellerError::Validation(_)
        | TellerError::InvalidInput(_)
        | TellerError::AccountExists(_)
        | TellerError::PasswordReused => 4,
        TellerError::IncorrectPassphrase => 5,
        _ => 1,
    }
}
