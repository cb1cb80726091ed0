use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_primitives::{Address, U256};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use confidential_bridge::{
    adapters::{EvmBridge, EvmClient, FileOutbox, LocalSigner},
    ports::{ConfidentialToken, ContractFactory, FheBackend, FheError, TypedDataSigner},
    AddressResolver, ClaimManager, ContractKey, DeploymentRegistry, FulfillOptions, IntentArtifact,
    IntentManager, NetworkConfig, PermitBuilder, PermitRequest, UnwrapOptions,
};
use fhe_bridge_types::{CiphertextHandle, Claim, EncryptedInput, FheType, TransferPermit};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Operate the confidential bridge from the command line.
///
/// Commands that need fresh encryption (creating intents, provisioning balances) are library-only:
/// they require an FHE co-processor client.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// JSON-RPC endpoint of the chain to act on.
    #[arg(long, env = "RPC_URL", global = true)]
    rpc_url: Option<String>,

    /// Private key (hex string, 0x...) of the acting account.
    #[arg(long, env = "PKEY", global = true, hide_env_values = true)]
    private_key: Option<String>,

    /// Network definitions (chain ids, LayerZero eids, contract addresses). Defaults to the
    /// built-in testnets.
    #[arg(long, env = "NETWORK_CONFIG", global = true)]
    network_config: Option<PathBuf>,

    /// Deployments JSON (eg, deployments.arb-sepolia.json); takes precedence over the network
    /// config.
    #[arg(long, env = "DEPLOYMENTS_PATH", global = true)]
    deployments_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pack a pre-image with metadata into a ciphertext handle.
    Pack {
        #[arg(long)]
        preimage: String,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        security_zone: i8,
        /// Uint type number (5 = uint64, 6 = uint128).
        #[arg(long, default_value_t = 6)]
        uint_type: u8,
        #[arg(long)]
        trivial: bool,
    },

    /// Split a ciphertext handle into pre-image and metadata.
    Unpack { handle: String },

    /// Sign a transfer permit over a ciphertext handle.
    Permit {
        #[arg(long)]
        spender: Address,
        #[arg(long)]
        value_hash: String,
        /// Unix timestamp; defaults to 24 hours from now.
        #[arg(long)]
        deadline: Option<u64>,
        #[arg(long)]
        token: Option<Address>,
    },

    /// Report whether an intent is created, exported or fulfilled.
    Status {
        #[arg(long)]
        id: U256,
        /// Directory holding exported `intent-<id>.json` files.
        #[arg(long, default_value = "intents")]
        outbox_dir: PathBuf,
        #[arg(long)]
        bridge: Option<Address>,
    },

    /// Fulfil an exported intent from the relayer's existing confidential balance.
    ///
    /// The artifact is first checked against the intent recorded on the origin chain.
    Fulfill {
        #[arg(long)]
        artifact: PathBuf,
        #[arg(long)]
        bridge: Option<Address>,
        /// JSON-RPC endpoint of the intent's origin chain.
        #[arg(long, env = "ORIGIN_RPC_URL")]
        origin_rpc_url: String,
        /// Bridge on the origin chain; resolved from the network config when omitted.
        #[arg(long)]
        origin_bridge: Option<Address>,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        security_zone: i8,
        #[arg(long, default_value_t = 6)]
        uint_type: u8,
    },

    /// List unwrap claims of an account (defaults to the acting account).
    Claims {
        #[arg(long)]
        account: Option<Address>,
        #[arg(long)]
        token: Option<Address>,
    },

    /// Claim one decrypted unwrap.
    Claim {
        #[arg(long)]
        ct_hash: U256,
        #[arg(long)]
        token: Option<Address>,
    },

    /// Claim every decrypted unwrap of the acting account.
    ClaimAll {
        #[arg(long)]
        token: Option<Address>,
    },

    /// Unwrap a confidential amount into a claim, then claim whatever is ready.
    Unwrap {
        #[arg(long)]
        amount: U256,
        /// Defaults to the acting account.
        #[arg(long)]
        to: Option<Address>,
        #[arg(long)]
        token: Option<Address>,
        #[arg(long)]
        no_claim: bool,
        #[arg(long, default_value_t = 3)]
        settle_secs: u64,
    },

    /// Let an operator move the acting account's balance without permits.
    SetOperator {
        #[arg(long)]
        operator: Address,
        /// Unix timestamp; defaults to one year from now.
        #[arg(long)]
        until: Option<u64>,
        #[arg(long)]
        token: Option<Address>,
    },

    IsOperator {
        #[arg(long)]
        holder: Address,
        #[arg(long)]
        operator: Address,
        #[arg(long)]
        token: Option<Address>,
    },
}

const ONE_YEAR: u64 = 365 * 24 * 60 * 60;

/// Stand-in for the co-processor client. Every call fails, so only flows that never encrypt or
/// unseal can run with it.
struct NoCoprocessor;

impl FheBackend for NoCoprocessor {
    async fn initialize(&self, _chain_id: u64, _account: Address) -> Result<(), FheError> {
        Err(unavailable())
    }

    async fn encrypt(&self, _value: U256, _utype: FheType) -> Result<EncryptedInput, FheError> {
        Err(unavailable())
    }

    async fn unseal(&self, _handle: CiphertextHandle, _utype: FheType) -> Result<U256, FheError> {
        Err(unavailable())
    }
}

fn unavailable() -> FheError {
    FheError::Backend("no FHE co-processor client in the CLI".into())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let output = run(&cli).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(cli: &Cli) -> Result<Value> {
    match &cli.command {
        Command::Pack {
            preimage,
            security_zone,
            uint_type,
            trivial,
        } => {
            if *uint_type > 0x7f {
                bail!("uint type {uint_type} does not fit the 7-bit type field");
            }
            let preimage = parse_handle(preimage)?.into_raw();
            let handle = CiphertextHandle::pack(preimage, *security_zone, *uint_type, *trivial);
            Ok(handle_json(handle))
        }

        Command::Unpack { handle } => Ok(handle_json(parse_handle(handle)?)),

        Command::Permit {
            spender,
            value_hash,
            deadline,
            token,
        } => {
            let session = Session::connect(cli).await?;
            let token = session.confidential_token(*token)?;
            let value_hash = parse_handle(value_hash)?;
            let mut request = PermitRequest::new(session.signer.address(), *spender, value_hash);
            request.deadline = deadline.map(U256::from);
            let permit = PermitBuilder::new(&token, &session.signer).build(request).await?;
            Ok(permit_json(&permit))
        }

        Command::Status { id, outbox_dir, bridge } => {
            let session = Session::connect(cli).await?;
            let bridge = session.bridge(*bridge)?;
            let stage = IntentManager::new(&bridge, &NoCoprocessor, &session.signer)
                .status(*id, &FileOutbox::new(outbox_dir))
                .await?;
            Ok(json!({ "id": id.to_string(), "stage": format!("{stage:?}") }))
        }

        Command::Fulfill {
            artifact,
            bridge,
            origin_rpc_url,
            origin_bridge,
            security_zone,
            uint_type,
        } => {
            let artifact = IntentArtifact::read_from(artifact)
                .with_context(|| format!("failed to read intent artifact {}", artifact.display()))?;
            let session = Session::connect(cli).await?;
            let bridge = session.bridge(*bridge)?;
            let origin = Session::connect_to(cli, origin_rpc_url, None).await?;
            let expected = u64::from(artifact.intent.origin_chain_id);
            if origin.client.chain_id() != expected {
                bail!(
                    "--origin-rpc-url serves chain {}, but the intent originates on {expected}",
                    origin.client.chain_id()
                );
            }
            let origin_bridge = origin.bridge(*origin_bridge)?;
            let token = session.client.confidential_token(artifact.intent.output_token);
            let options = FulfillOptions {
                security_zone: *security_zone,
                uint_type: *uint_type,
            };
            let receipt = IntentManager::new(&bridge, &NoCoprocessor, &session.signer)
                .fulfill(&origin_bridge, &token, &artifact, options)
                .await?;
            info!(intent_id = %artifact.intent_id(), "done");
            Ok(json!({ "id": artifact.intent_id().to_string(), "tx": receipt.tx_hash.to_string() }))
        }

        Command::Claims { account, token } => {
            let session = Session::connect(cli).await?;
            let token = session.confidential_token(*token)?;
            let account = account.unwrap_or(session.signer.address());
            let claims = ClaimManager::new(&token).claims(account).await?;
            Ok(Value::Array(claims.iter().map(claim_json).collect()))
        }

        Command::Claim { ct_hash, token } => {
            let session = Session::connect(cli).await?;
            let token = session.confidential_token(*token)?;
            let claim = ClaimManager::new(&token).claim_one(*ct_hash).await?;
            Ok(claim_json(&claim))
        }

        Command::ClaimAll { token } => {
            let session = Session::connect(cli).await?;
            let token = session.confidential_token(*token)?;
            let report = ClaimManager::new(&token).claim_all(session.signer.address()).await?;
            Ok(json!({
                "ready": report.ready,
                "pending": report.pending,
                "claimedAmount": report.claimed_amount.to_string(),
                "tx": report.receipt.map(|r| r.tx_hash.to_string()),
            }))
        }

        Command::Unwrap {
            amount,
            to,
            token,
            no_claim,
            settle_secs,
        } => {
            let session = Session::connect(cli).await?;
            let token = session.confidential_token(*token)?;
            let to = to.unwrap_or(session.signer.address());
            let options = UnwrapOptions {
                auto_claim: !no_claim,
                settle_delay: Duration::from_secs(*settle_secs),
            };
            let outcome = ClaimManager::new(&token).unwrap(to, *amount, options).await?;
            Ok(json!({
                "tx": outcome.receipt.tx_hash.to_string(),
                "claimed": outcome.claims.map(|c| json!({
                    "ready": c.ready,
                    "pending": c.pending,
                    "claimedAmount": c.claimed_amount.to_string(),
                })),
            }))
        }

        Command::SetOperator { operator, until, token } => {
            let session = Session::connect(cli).await?;
            let token = session.confidential_token(*token)?;
            let until = until.unwrap_or_else(|| confidential_bridge::now_unix() + ONE_YEAR);
            let receipt = token.set_operator(*operator, until).await?;
            Ok(json!({
                "operator": operator.to_checksum(None),
                "until": until,
                "tx": receipt.tx_hash.to_string(),
            }))
        }

        Command::IsOperator {
            holder,
            operator,
            token,
        } => {
            let session = Session::connect(cli).await?;
            let token = session.confidential_token(*token)?;
            Ok(json!({ "isOperator": token.is_operator(*holder, *operator).await? }))
        }
    }
}

/// Connected client, signing key and address book for one chain.
struct Session {
    client: EvmClient,
    signer: LocalSigner,
    resolver: AddressResolver,
}

impl Session {
    async fn connect(cli: &Cli) -> Result<Self> {
        let rpc_url = cli
            .rpc_url
            .as_deref()
            .ok_or_else(|| anyhow!("--rpc-url (or RPC_URL) is required"))?;
        Self::connect_to(cli, rpc_url, cli.deployments_path.as_deref()).await
    }

    /// Connect to `rpc_url` with the acting key; `deployments` applies to that chain only.
    async fn connect_to(cli: &Cli, rpc_url: &str, deployments: Option<&Path>) -> Result<Self> {
        let private_key = cli
            .private_key
            .as_deref()
            .ok_or_else(|| anyhow!("--private-key (or PKEY) is required"))?;

        let client = EvmClient::connect(rpc_url, private_key)
            .await
            .with_context(|| format!("failed to connect to {rpc_url}"))?;
        let signer = LocalSigner::from_hex(private_key)?;
        if signer.address() != client.sender() {
            bail!("signing key and transaction key disagree");
        }

        let config = match &cli.network_config {
            Some(path) => NetworkConfig::load(path)?,
            None => NetworkConfig::testnets(),
        };
        let deployments = deployments.map(DeploymentRegistry::load).transpose()?;
        let resolver = AddressResolver::new(client.chain_id(), config, deployments);

        info!(chain_id = client.chain_id(), account = %client.sender(), "session ready");
        Ok(Self {
            client,
            signer,
            resolver,
        })
    }

    fn confidential_token(&self, explicit: Option<Address>) -> Result<impl ConfidentialToken> {
        let address = self.resolver.resolve(ContractKey::ConfidentialToken, explicit)?;
        Ok(self.client.confidential_token(address))
    }

    fn bridge(&self, explicit: Option<Address>) -> Result<EvmBridge> {
        let address = self.resolver.resolve(ContractKey::Bridge, explicit)?;
        Ok(EvmBridge::new(self.client.clone(), address))
    }
}

fn parse_handle(raw: &str) -> Result<CiphertextHandle> {
    raw.parse()
        .map_err(|e| anyhow!("invalid ciphertext handle `{raw}`: {e:?}"))
}

fn handle_json(handle: CiphertextHandle) -> Value {
    let meta = handle.metadata();
    json!({
        "handle": handle.to_string(),
        "preimage": handle.preimage().to_string(),
        "securityZone": meta.security_zone,
        "uintType": meta.uint_type,
        "fheType": handle.fhe_type().map(|t| format!("{t:?}")),
        "isTrivial": meta.is_trivial,
    })
}

fn permit_json(permit: &TransferPermit) -> Value {
    json!({
        "owner": permit.owner.to_checksum(None),
        "spender": permit.spender.to_checksum(None),
        "valueHash": permit.value_hash.to_string(),
        "nonce": permit.nonce.to_string(),
        "deadline": permit.deadline.to_string(),
        "v": permit.signature.v,
        "r": permit.signature.r.to_string(),
        "s": permit.signature.s.to_string(),
    })
}

fn claim_json(claim: &Claim) -> Value {
    json!({
        "ctHash": claim.ct_hash.to_string(),
        "to": claim.to.to_checksum(None),
        "requestedAmount": claim.requested_amount.to_string(),
        "decryptedAmount": claim.decrypted_amount.to_string(),
        "status": format!("{:?}", claim.status()),
    })
}
