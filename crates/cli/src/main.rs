use chrono::Duration;
use clap::{Parser, Subcommand};
use mera_core::{CoreConfig, EmergencyAccessService, IdentityService, ShardedUuid};
use mera_credentials::{SigningKeyMaterial, TokenSigner};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "mera")]
#[command(about = "MERA medical record system operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all registered actors
    List,
    /// Mark a doctor or emergency responder as verified
    VerifyProfessional {
        /// Actor UUID (32 lowercase hex characters)
        actor_uuid: String,
    },
    /// Soft-deactivate an account
    Deactivate {
        /// Actor UUID (32 lowercase hex characters)
        actor_uuid: String,
    },
    /// Issue an emergency QR token for a patient
    IssueEmergencyToken {
        /// Patient UUID (32 lowercase hex characters)
        patient_uuid: String,
        /// Token validity in minutes (default 60)
        #[arg(long)]
        ttl_minutes: Option<i64>,
    },
    /// Generate a new PKCS#8 PEM token-signing key
    NewSigningKey {
        /// Where to write the key file
        path: PathBuf,
    },
}

fn core_config() -> Result<Arc<CoreConfig>, Box<dyn std::error::Error>> {
    let data_dir = std::env::var("MERA_DATA_DIR")
        .unwrap_or_else(|_| mera_core::constants::DEFAULT_DATA_DIR.into());
    Ok(Arc::new(CoreConfig::new(PathBuf::from(data_dir))?))
}

/// Loads the signing key named by MERA_SIGNING_KEY.
///
/// Token issuance must use the same key the server verifies with, so an
/// unset variable is an error here rather than a fall-back to an ephemeral
/// key.
fn signer_from_env() -> Result<TokenSigner, Box<dyn std::error::Error>> {
    let path = std::env::var("MERA_SIGNING_KEY")
        .map_err(|_| "MERA_SIGNING_KEY must point at the server's signing key")?;
    let material = SigningKeyMaterial::load_from_pem_file(Path::new(&path))?;
    Ok(TokenSigner::new(&material))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::List) => {
            let identity =
                IdentityService::new(core_config()?, TokenSigner::new(&SigningKeyMaterial::generate()));
            let actors = identity.list_actors()?;
            if actors.is_empty() {
                println!("No actors found.");
            } else {
                for actor in actors {
                    println!(
                        "ID: {}, Role: {}, Name: {} {}, Email: {}, Active: {}",
                        ShardedUuid::from(actor.id),
                        actor.role(),
                        actor.first_name,
                        actor.last_name,
                        actor.email,
                        actor.is_active
                    );
                }
            }
        }
        Some(Commands::VerifyProfessional { actor_uuid }) => {
            let id = ShardedUuid::parse(&actor_uuid)?;
            let identity =
                IdentityService::new(core_config()?, TokenSigner::new(&SigningKeyMaterial::generate()));
            match identity.verify_professional(id.uuid()) {
                Ok(actor) => println!(
                    "Verified {} {} ({})",
                    actor.first_name,
                    actor.last_name,
                    actor.role()
                ),
                Err(e) => eprintln!("Error verifying professional: {e}"),
            }
        }
        Some(Commands::Deactivate { actor_uuid }) => {
            let id = ShardedUuid::parse(&actor_uuid)?;
            let identity =
                IdentityService::new(core_config()?, TokenSigner::new(&SigningKeyMaterial::generate()));
            match identity.deactivate(id.uuid()) {
                Ok(actor) => println!("Deactivated {}", actor.email),
                Err(e) => eprintln!("Error deactivating account: {e}"),
            }
        }
        Some(Commands::IssueEmergencyToken {
            patient_uuid,
            ttl_minutes,
        }) => {
            let id = ShardedUuid::parse(&patient_uuid)?;
            let service = EmergencyAccessService::new(core_config()?, signer_from_env()?);
            let ttl = ttl_minutes.map(Duration::minutes);
            match service.issue_for(id.uuid(), ttl) {
                Ok(token) => println!("{token}"),
                Err(e) => eprintln!("Error issuing emergency token: {e}"),
            }
        }
        Some(Commands::NewSigningKey { path }) => {
            let material = SigningKeyMaterial::generate();
            material.write_pem_file(&path)?;
            println!("Wrote new signing key to {}", path.display());
        }
        None => {
            println!("No command provided. Try --help.");
        }
    }

    Ok(())
}
