//! Subcommand handlers. Each one loads whatever slice of `config.yaml` it
//! needs, builds the library-crate objects for that one job, and returns —
//! none of this runs as a long-lived service except `stream`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use basin_common::timestamp::parse_timestamp;
use basin_common::VaultId;
use basin_config::{config_file_path, vault_workspace_dir, Config, VaultConfig};
use basin_replication::provision_slot;
use basin_retriever::Retriever;
use basin_streamer::{Streamer, StreamerConfig};
use basin_uploader::{NoopProgress, Uploader};
use basin_vault::{HttpsVaultClient, ListEventsQuery, VaultClient};
use secp256k1::{SecretKey, SECP256K1};
use tokio::io::AsyncWriteExt;
use tokio_postgres::config::Host;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::cli::{Command, OutputFormat, WalletCommand};

/// Fallback Vaults provider used for `create` entries and for read paths
/// (`list`, `retrieve`) that have no per-vault config entry to consult yet.
const DEFAULT_PROVIDER_HOST: &str = "https://vaults.tableland.xyz";

/// Public, Tableland-operated trustless IPFS gateway used by the retriever's
/// content-addressed fallback tier.
const DEFAULT_GATEWAY_BASE: &str = "https://vaults.tableland.xyz/ipfs/";

pub async fn run(config_dir: PathBuf, command: Command) -> Result<()> {
    match command {
        Command::Stream { private_key, vault } => run_stream(&config_dir, &private_key, &vault).await,
        Command::Create {
            account,
            dburi,
            window_size,
            cache,
            vault,
        } => run_create(&config_dir, &account, dburi, window_size, cache, &vault).await,
        Command::Write {
            vault,
            private_key,
            timestamp,
            file,
        } => run_write(&config_dir, &vault, &private_key, timestamp, &file).await,
        Command::List { account } => run_list(&config_dir, &account).await,
        Command::Events {
            vault,
            limit,
            offset,
            before,
            after,
            at,
            latest,
            format,
        } => run_events(&config_dir, &vault, limit, offset, before, after, at, latest, format).await,
        Command::Retrieve { output, cid } => run_retrieve(&config_dir, &output, &cid).await,
        Command::Wallet(WalletCommand::Create { file }) => run_wallet_create(&file).await,
        Command::Wallet(WalletCommand::Pubkey { file }) => run_wallet_pubkey(&file).await,
    }
}

fn load_config(config_dir: &Path) -> Result<Config> {
    let path = config_file_path(config_dir);
    if !path.exists() {
        return Ok(Config::default());
    }
    Config::load(&path).context("failed to load config.yaml")
}

fn parse_private_key(hex_str: &str) -> Result<SecretKey> {
    let bytes = hex::decode(hex_str.trim_start_matches("0x")).context("--private-key is not valid hex")?;
    SecretKey::from_slice(&bytes).context("--private-key is not a valid secp256k1 scalar")
}

fn pg_config_from_vault(vault: &VaultConfig) -> tokio_postgres::Config {
    let mut config = tokio_postgres::Config::new();
    config
        .host(&vault.host)
        .port(vault.port)
        .user(&vault.user)
        .password(&vault.password)
        .dbname(&vault.database);
    config
}

/// Decomposes a `--dburi` connection string into the individual fields
/// `config.yaml` stores, so `stream` can later rebuild an equivalent
/// `tokio_postgres::Config` without re-parsing the original URI.
fn vault_config_from_dburi(
    dburi: &str,
    provider_host: String,
    window_size: u64,
) -> Result<(tokio_postgres::Config, VaultConfig)> {
    let pg_config: tokio_postgres::Config = dburi.parse().context("invalid --dburi connection string")?;

    let host = match pg_config.get_hosts().first() {
        Some(Host::Tcp(host)) => host.clone(),
        _ => bail!("--dburi must specify a TCP host"),
    };
    let port = pg_config.get_ports().first().copied().unwrap_or(5432);
    let user = pg_config.get_user().unwrap_or("postgres").to_string();
    let password = pg_config
        .get_password()
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_default();
    let database = pg_config.get_dbname().unwrap_or(&user).to_string();

    let vault_config = VaultConfig {
        host,
        port,
        user,
        password,
        database,
        provider_host,
        window_size,
    };
    Ok((pg_config, vault_config))
}

fn resolve_provider_host(config: &Config, vault_id: Option<&str>) -> String {
    if let Some(id) = vault_id {
        if let Some(vault) = config.vaults.get(id) {
            return vault.provider_host.clone();
        }
    }
    config
        .vaults
        .values()
        .next()
        .map(|v| v.provider_host.clone())
        .unwrap_or_else(|| DEFAULT_PROVIDER_HOST.to_string())
}

fn vault_client_for(provider_host: &str) -> Result<Arc<dyn VaultClient>> {
    let base = Url::parse(provider_host).context("invalid provider host")?;
    Ok(Arc::new(HttpsVaultClient::new(base)))
}

async fn run_stream(config_dir: &Path, private_key_hex: &str, vault_id: &str) -> Result<()> {
    let config = load_config(config_dir)?;
    let vault_config = config
        .vault(vault_id)
        .with_context(|| format!("no config entry for vault '{vault_id}'; run `create` first"))?;
    let parsed_id: VaultId = vault_id.parse().context("vault must be of the form namespace.relation")?;

    let private_key = parse_private_key(private_key_hex)?;
    let vault_client = vault_client_for(&vault_config.provider_host)?;
    let pg_config = pg_config_from_vault(vault_config);
    let workspace_dir = vault_workspace_dir(config_dir, vault_id);

    let streamer_config = StreamerConfig {
        workspace_dir,
        vault: vault_client,
        vault_id: vault_id.to_string(),
        private_key,
        pg_config,
        schema: parsed_id.namespace.clone(),
        relation: parsed_id.relation.clone(),
        slot_name: parsed_id.slot_name(),
        window: Duration::from_secs(vault_config.window_size),
    };

    tracing::info!(vault = vault_id, "starting replication pipeline");
    let streamer = Streamer::start(streamer_config).await?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received ctrl-c, shutting down");
            signal_token.cancel();
        }
    });

    streamer.run(shutdown).await?;
    Ok(())
}

async fn run_create(
    config_dir: &Path,
    account: &str,
    dburi: Option<String>,
    window_size: Option<u64>,
    cache: Option<u32>,
    vault_id: &str,
) -> Result<()> {
    let _: VaultId = vault_id.parse().context("vault must be of the form namespace.relation")?;
    let mut config = load_config(config_dir)?;

    let provider_host = resolve_provider_host(&config, Some(vault_id));
    let vault_client = vault_client_for(&provider_host)?;
    vault_client.create_vault(vault_id, account, cache).await?;
    tracing::info!(vault = vault_id, account, "created vault");

    if let Some(dburi) = dburi {
        let window = window_size.unwrap_or(3600);
        let (pg_config, vault_config) = vault_config_from_dburi(&dburi, provider_host, window)?;
        let parsed_id: VaultId = vault_id.parse().expect("validated above");

        provision_slot(&pg_config, &parsed_id.slot_name()).await?;
        tracing::info!(vault = vault_id, slot = %parsed_id.slot_name(), "provisioned replication slot");

        config.vaults.insert(vault_id.to_string(), vault_config);
        config.save(&config_file_path(config_dir))?;
    }

    Ok(())
}

async fn run_write(
    config_dir: &Path,
    vault_id: &str,
    private_key_hex: &str,
    timestamp: Option<String>,
    file: &Path,
) -> Result<()> {
    let config = load_config(config_dir)?;
    let provider_host = resolve_provider_host(&config, Some(vault_id));
    let vault_client = vault_client_for(&provider_host)?;
    let private_key = parse_private_key(private_key_hex)?;

    let timestamp = timestamp.map(|t| parse_timestamp(&t)).transpose()?;

    let uploader = Uploader::new(vault_client, vault_id.to_string(), private_key);
    uploader.upload(file, timestamp, &NoopProgress).await?;
    println!("uploaded {} to {vault_id}", file.display());
    Ok(())
}

async fn run_list(config_dir: &Path, account: &str) -> Result<()> {
    let config = load_config(config_dir)?;
    let provider_host = resolve_provider_host(&config, None);
    let vault_client = vault_client_for(&provider_host)?;

    let vaults = vault_client.list_vaults(account).await?;
    for vault in vaults {
        println!("{vault}");
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_events(
    config_dir: &Path,
    vault_id: &str,
    limit: Option<u32>,
    offset: Option<u32>,
    before: Option<String>,
    after: Option<String>,
    at: Option<String>,
    latest: bool,
    format: OutputFormat,
) -> Result<()> {
    let config = load_config(config_dir)?;
    let provider_host = resolve_provider_host(&config, Some(vault_id));
    let vault_client = vault_client_for(&provider_host)?;

    let query = ListEventsQuery {
        limit,
        offset,
        before: before.map(|t| parse_timestamp(&t)).transpose()?,
        after: after.map(|t| parse_timestamp(&t)).transpose()?,
    };
    let mut events = vault_client.list_events(vault_id, query).await?;

    if latest {
        if let Some(newest) = events.iter().max_by_key(|e| e.timestamp).cloned() {
            events = vec![newest];
        } else {
            events.clear();
        }
    } else if let Some(at) = at {
        let cutoff = parse_timestamp(&at)?;
        events = events
            .into_iter()
            .filter(|e| e.timestamp <= cutoff)
            .max_by_key(|e| e.timestamp)
            .into_iter()
            .collect();
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        OutputFormat::Table => {
            println!("{:<20}\t{:<20}\tFILENAME", "CID", "TIMESTAMP");
            for event in &events {
                println!(
                    "{:<20}\t{:<20}\t{}",
                    event.cid,
                    event.timestamp,
                    event.filename.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}

async fn run_retrieve(config_dir: &Path, output: &str, cid: &str) -> Result<()> {
    let config = load_config(config_dir)?;
    let provider_host = resolve_provider_host(&config, None);
    let vault_client = vault_client_for(&provider_host)?;
    let gateway_base = Url::parse(DEFAULT_GATEWAY_BASE).expect("static gateway URL is well-formed");

    let retriever = Retriever::new(vault_client, reqwest::Client::new(), gateway_base);

    if output == "-" {
        let mut stdout = tokio::io::stdout();
        retriever.retrieve(cid, &mut stdout).await?;
        stdout.flush().await?;
    } else {
        let mut file = tokio::fs::File::create(output).await?;
        retriever.retrieve(cid, &mut file).await?;
        file.flush().await?;
    }
    Ok(())
}

async fn run_wallet_create(file: &Path) -> Result<()> {
    let private_key = SecretKey::new(&mut rand::thread_rng());
    tokio::fs::write(file, hex::encode(private_key.secret_bytes())).await?;
    println!("wrote new private key to {}", file.display());
    Ok(())
}

async fn run_wallet_pubkey(file: &Path) -> Result<()> {
    let contents = tokio::fs::read_to_string(file).await?;
    let private_key = parse_private_key(contents.trim())?;
    let public_key = private_key.public_key(SECP256K1);
    println!("{}", hex::encode(public_key.serialize()));
    Ok(())
}
