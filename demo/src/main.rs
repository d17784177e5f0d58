use std::sync::Arc;

use anyhow::Result;
use bigdecimal::BigDecimal;
use clap::{Parser, Subcommand};
use log::info;
use rollups_bindings::bindings::{cartesi_erc20_portal, cartesi_input_box, erc20};
use rollups_bindings::utils::eth_to_wei;
use rollups_bindings::{
    AbiValue, Address, AlloyTransport, Bytes, EventFilter, PrivateKeySigner, SchemaRegistry,
    Transport, TransportConfig, TxOutcome, Url,
};

/// Demo of the rollups bindings against a running node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL of the node (http(s) or ws(s))
    #[arg(short, long, default_value = "http://localhost:8545")]
    url: Url,

    /// Hex private key used to sign transactions
    #[arg(long, env = "PRIVATE_KEY")]
    private_key: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print name, symbol, decimals and the balance of an account
    TokenInfo {
        #[arg(long)]
        token: Address,
        #[arg(long)]
        account: Address,
    },
    /// Send an input to an application through the input box
    AddInput {
        #[arg(long)]
        input_box: Address,
        #[arg(long)]
        dapp: Address,
        /// Input payload, sent as UTF-8 bytes
        payload: String,
    },
    /// Approve the portal and deposit ERC20 tokens into an application
    Deposit {
        #[arg(long)]
        portal: Address,
        #[arg(long)]
        token: Address,
        #[arg(long)]
        dapp: Address,
        /// Amount in whole tokens, assuming 18 decimals
        #[arg(long)]
        amount: BigDecimal,
    },
    /// Print inputs added to an application until interrupted
    WatchInputs {
        #[arg(long)]
        input_box: Address,
        #[arg(long)]
        dapp: Address,
    },
    /// Print the JSON ABI of a built-in schema
    Abi {
        /// One of erc20, erc721, cartesi_dapp, cartesi_input_box, cartesi_erc20_portal
        name: String,
    },
}

async fn connect(args: &Args) -> Result<Arc<dyn Transport>> {
    let config = TransportConfig::default();
    let transport = match &args.private_key {
        Some(key) => {
            let signer: PrivateKeySigner = key.parse()?;
            info!("Using account {}", signer.address());
            AlloyTransport::connect(args.url.clone(), signer, config).await?
        }
        None => AlloyTransport::connect_read_only(args.url.clone(), config).await?,
    };
    Ok(Arc::new(transport))
}

fn report(outcome: &TxOutcome) {
    match outcome {
        TxOutcome::Confirmed(receipt) => info!(
            "Transaction {} confirmed in block {:?}",
            receipt.transaction_hash, receipt.block_number
        ),
        TxOutcome::Reverted(receipt) => info!(
            "Transaction {} reverted in block {:?}",
            receipt.transaction_hash, receipt.block_number
        ),
        TxOutcome::Dropped {
            transaction_hash,
            reason,
        } => info!("Transaction {transaction_hash} dropped: {reason}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match &args.command {
        Command::Abi { name } => {
            let schema = SchemaRegistry::with_builtin().get(name)?;
            println!("{}", serde_json::to_string_pretty(schema.as_ref())?);
        }
        Command::TokenInfo { token, account } => {
            let transport = connect(&args).await?;
            let token = erc20::get(*token, transport);
            for function in ["name", "symbol", "decimals"] {
                let values = token.read(function, &[]).await?;
                info!("{function}: {}", AbiValue::Tuple(values));
            }
            let balance = token.read("balanceOf", &[(*account).into()]).await?;
            info!("balanceOf({account}): {}", AbiValue::Tuple(balance));
        }
        Command::AddInput {
            input_box,
            dapp,
            payload,
        } => {
            let transport = connect(&args).await?;
            let input = Bytes::copy_from_slice(payload.as_bytes());
            let prepared = cartesi_input_box::prepare_write(
                *input_box,
                transport,
                "addInput",
                vec![(*dapp).into(), input.into()],
                None,
                true,
            )
            .await?;
            if let Some(input_hash) = prepared.simulated() {
                info!("Expected input hash: {}", AbiValue::Tuple(input_hash.to_vec()));
            }
            let outcome = prepared.submit().await?.wait().await?;
            report(&outcome);
        }
        Command::Deposit {
            portal,
            token,
            dapp,
            amount,
        } => {
            let transport = connect(&args).await?;
            let amount = eth_to_wei(amount.clone())?;

            info!("Approving {amount} for the portal");
            let approval = erc20::write(
                *token,
                transport.clone(),
                "approve",
                &[(*portal).into(), amount.into()],
                None,
            )
            .await?
            .wait()
            .await?;
            report(&approval);
            if !approval.is_confirmed() {
                anyhow::bail!("Approval failed, not depositing");
            }

            info!("Depositing {amount} into {dapp}");
            let deposit = cartesi_erc20_portal::write(
                *portal,
                transport,
                "depositERC20Tokens",
                &[
                    (*token).into(),
                    (*dapp).into(),
                    amount.into(),
                    Bytes::new().into(),
                ],
                None,
            )
            .await?
            .wait()
            .await?;
            report(&deposit);
        }
        Command::WatchInputs { input_box, dapp } => {
            let transport = connect(&args).await?;
            let filter = EventFilter::new("InputAdded").with("dapp", *dapp);
            let watch = cartesi_input_box::watch_event(*input_box, transport, filter, |event| {
                let index = event.get("inputIndex").map(ToString::to_string);
                let sender = event.get("sender").map(ToString::to_string);
                info!(
                    "Input {} from {} in block {:?}",
                    index.unwrap_or_default(),
                    sender.unwrap_or_default(),
                    event.block_number
                );
            })
            .await?;

            tokio::select! {
                result = watch.closed() => result?,
                _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            }
        }
    }

    Ok(())
}
