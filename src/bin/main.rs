//! Seed Lottery CLI
//!
//! Every command prints one JSON value on stdout:
//!   seedlottery derive "<mnemonic>" --count 5   → [{index, path, address}, ...]
//!   seedlottery balance bc1q...                 → {address, satoshis, provider}
//!   seedlottery play                            → {round, result, ...}
//!
//! Progress and logs go to stderr. Settings come from `SEEDLOTTERY_*` env vars
//! (a `.env` file in the working directory is loaded first), flags override them.
//!
//! Output format:
//!   --json     Compact JSON (default for non-tty)
//!   --pretty   Pretty-print JSON (default for tty)

use anyhow::{anyhow, bail, Context, Result};
use seedlottery::logging::init_logging;
use seedlottery::{
    derive_addresses, install_signal_handlers, progress_channel, BalanceLookup, BalanceOracle, Game, GameConfig,
    GameError, LnurlClient, Payment, ScanCoordinator, ScanProgress, SeedPhrase,
};
use serde_json::{json, Value};
use std::env;
use std::io::{IsTerminal, Write};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

fn main() {
    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);
    init_logging();

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("seedlottery {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let Some(command) = opts.command.clone() else {
        print_usage();
        return;
    };

    let result = tokio::runtime::Runtime::new()
        .context("Failed to create runtime")
        .and_then(|rt| rt.block_on(run(&command, &opts)));

    let pretty = !opts.json && (opts.pretty || std::io::stdout().is_terminal());
    match result {
        Ok(output) => println!("{}", render(&output, pretty)),
        Err(e) => {
            eprintln!("{}", render(&json!({ "error": format!("{:#}", e) }), pretty));
            std::process::exit(1);
        }
    }
}

fn render(value: &Value, pretty: bool) -> String {
    let rendered = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    rendered.unwrap_or_else(|_| value.to_string())
}

async fn run(command: &str, opts: &ParsedArgs) -> Result<Value> {
    match command {
        "derive" => cmd_derive(opts),
        "generate" | "gen" => cmd_generate(opts),
        "balance" => cmd_balance(opts).await,
        "resolve" => cmd_resolve(opts).await,
        "invoice" => cmd_invoice(opts).await,
        "verify" => cmd_verify(opts).await,
        "scan" => cmd_scan(opts).await,
        "survey" => cmd_survey(opts).await,
        "play" => cmd_play(opts).await,
        other => bail!("Unknown command: {}", other),
    }
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    /// Everything after the command, joined. A mnemonic, an address or a URL.
    target: Option<String>,
    count: Option<u32>,
    amount: Option<u64>,
    comment: Option<String>,
    lightning_address: Option<String>,
    insecure: bool,
    json: bool,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        load_dotenv();

        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            let value = args.get(i + 1);
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--json" => opts.json = true,
                "--pretty" => opts.pretty = true,
                "--insecure" => opts.insecure = true,
                "--count" | "-c" if value.is_some() => {
                    opts.count = value.and_then(|v| v.parse().ok());
                    i += 1;
                }
                "--amount" if value.is_some() => {
                    opts.amount = value.and_then(|v| v.parse().ok());
                    i += 1;
                }
                "--comment" if value.is_some() => {
                    opts.comment = value.cloned();
                    i += 1;
                }
                "--address" | "-a" if value.is_some() => {
                    opts.lightning_address = value.cloned();
                    i += 1;
                }
                _ if !arg.starts_with('-') => positional.push(arg.clone()),
                _ => {} // Ignore unknown flags
            }
            i += 1;
        }

        // First positional is command, the rest is its target (mnemonics span many words)
        if !positional.is_empty() {
            opts.command = Some(positional.remove(0));
        }
        if !positional.is_empty() {
            opts.target = Some(positional.join(" "));
        }

        opts
    }

    /// Env config with command-line overrides applied.
    fn game_config(&self) -> Result<GameConfig> {
        let mut config = GameConfig::from_env()?;
        if let Some(address) = &self.lightning_address {
            config.lightning_address = address.clone();
        }
        if let Some(amount) = self.amount {
            config.amount_sats = amount;
        }
        if let Some(comment) = &self.comment {
            config.comment = Some(comment.clone());
        }
        if let Some(count) = self.count {
            if count == 0 {
                bail!("--count must be at least 1");
            }
            config.scan.address_count = count;
        }
        if self.insecure {
            config.http.allow_insecure_http = true;
        }
        Ok(config)
    }

    fn target(&self, what: &str) -> Result<&str> {
        self.target.as_deref().ok_or_else(|| anyhow!("{} required", what))
    }
}

/// Values already set in the environment win over the file.
fn load_dotenv() {
    let Ok(contents) = std::fs::read_to_string(".env") else {
        return;
    };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"');
            if !value.is_empty() && env::var(key.trim()).is_err() {
                env::set_var(key.trim(), value);
            }
        }
    }
}

fn print_usage() {
    println!(
        r#"seedlottery - pay a Lightning invoice, roll a seed, scan it for funds

USAGE:
    seedlottery <command> [target] [options]

COMMANDS:
    generate                Generate a fresh 12-word seed
    derive <mnemonic>       Derive BIP84 addresses (m/84'/0'/0'/0/i)
    balance <address>       Confirmed on-chain balance via public providers
    scan <mnemonic>         Walk addresses until one holds funds
    survey <mnemonic>       Check every address and list all funded ones
    resolve [user@domain]   Fetch the LNURL-pay descriptor
    invoice [user@domain]   Request an invoice
    verify <url>            Ask a LUD-21 verify URL whether the invoice is paid
    play                    Full round: invoice → payment → seed → scan

OPTIONS:
    --count, -c <n>         Addresses to derive/scan (env: SEEDLOTTERY_ADDRESS_COUNT)
    --amount <sats>         Invoice amount (env: SEEDLOTTERY_AMOUNT_SATS)
    --comment <text>        Invoice comment (env: SEEDLOTTERY_COMMENT)
    --address, -a <addr>    Lightning address (env: SEEDLOTTERY_LNADDRESS)
    --insecure              Resolve Lightning addresses over http
    --json                  Compact JSON output
    --pretty                Pretty-print JSON
    --version, -V           Print version

ENVIRONMENT:
    SEEDLOTTERY_HTTP_TIMEOUT_SECS   Per-request timeout (default 10)
    SEEDLOTTERY_POLL_INTERVAL_SECS  Payment poll interval (default 3)
    SEEDLOTTERY_POLL_TIMEOUT_SECS   Give up on payment after (default 600, 0 = never)
    SEEDLOTTERY_LOG_JSON=1          JSON logs on stderr
    RUST_LOG                        Log filter (default info)

EXAMPLES:
    seedlottery derive "abandon abandon ... about" --count 2
    seedlottery balance bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu
    seedlottery invoice dios@lawallet.ar --amount 2025 --comment "good luck"
    seedlottery scan "abandon abandon ... about" --json | jq .found
    seedlottery survey "abandon abandon ... about" --count 10
"#
    );
}

fn cmd_generate(opts: &ParsedArgs) -> Result<Value> {
    let phrase = SeedPhrase::generate();
    let count = opts.count.unwrap_or(1);
    let addresses = derive_addresses(phrase.as_str(), count)?;
    Ok(json!({
        "mnemonic": phrase.as_str(),
        "addresses": addresses_json(&addresses),
    }))
}

fn cmd_derive(opts: &ParsedArgs) -> Result<Value> {
    let mnemonic = opts.target("Mnemonic")?;
    let count = opts.count.unwrap_or(seedlottery::config::DEFAULT_ADDRESS_COUNT);
    let addresses = derive_addresses(mnemonic, count)?;
    Ok(addresses_json(&addresses))
}

fn addresses_json(addresses: &[seedlottery::DerivedAddress]) -> Value {
    addresses
        .iter()
        .map(|a| json!({ "index": a.index, "path": a.path(), "address": a.address }))
        .collect()
}

async fn cmd_balance(opts: &ParsedArgs) -> Result<Value> {
    let address = opts.target("Address")?;
    let config = opts.game_config()?;
    let oracle = BalanceOracle::with_defaults(&config.http)?;
    let lookup = oracle.lookup(address).await;
    let output = match &lookup {
        BalanceLookup::Confirmed { provider, satoshis } => {
            json!({ "address": address, "satoshis": satoshis, "provider": provider })
        }
        BalanceLookup::Unknown { failures } => {
            let failures: Vec<Value> = failures
                .iter()
                .map(|f| json!({ "provider": f.provider, "error": f.error.to_string() }))
                .collect();
            json!({ "address": address, "satoshis": 0, "provider": null, "failures": failures })
        }
    };
    Ok(output)
}

async fn cmd_resolve(opts: &ParsedArgs) -> Result<Value> {
    let config = opts.game_config()?;
    let pay_address = opts.target.clone().unwrap_or(config.lightning_address.clone());
    let client = LnurlClient::new(&config.http)?;
    let d = client.resolve(&pay_address).await?;
    Ok(json!({
        "address": pay_address,
        "callback": d.callback.as_str(),
        "min_sendable_msat": d.min_sendable_msat,
        "max_sendable_msat": d.max_sendable_msat,
        "min_sats": d.min_sats(),
        "max_sats": d.max_sats(),
        "comment_allowed": d.comment_allowed,
        "metadata": d.metadata,
    }))
}

async fn cmd_invoice(opts: &ParsedArgs) -> Result<Value> {
    let config = opts.game_config()?;
    let pay_address = opts.target.clone().unwrap_or(config.lightning_address.clone());
    let client = LnurlClient::new(&config.http)?;
    let invoice = client.fetch_invoice(&pay_address, config.amount_sats, config.comment.as_deref()).await?;
    Ok(serde_json::to_value(invoice)?)
}

async fn cmd_verify(opts: &ParsedArgs) -> Result<Value> {
    let url = opts.target("Verify URL")?;
    let config = opts.game_config()?;
    let client = LnurlClient::new(&config.http)?;
    let report = client.verify_payment(url).await?;
    Ok(serde_json::to_value(report)?)
}

async fn cmd_scan(opts: &ParsedArgs) -> Result<Value> {
    let mnemonic = opts.target("Mnemonic")?.to_string();
    let config = opts.game_config()?;
    let oracle = BalanceOracle::with_defaults(&config.http)?;
    let scanner = ScanCoordinator::new(config.scan.clone(), Arc::new(oracle));

    let shutdown = install_signal_handlers();
    let cancel = shutdown.round_token();
    let (progress, rx) = progress_channel();
    let reporter = tokio::spawn(report_progress(rx, cancel.clone()));

    let outcome = scanner.scan(&mnemonic, scanner.config().address_count, &cancel, &progress).await;
    cancel.cancel();
    let _ = reporter.await;
    Ok(serde_json::to_value(outcome?)?)
}

async fn cmd_survey(opts: &ParsedArgs) -> Result<Value> {
    let phrase = SeedPhrase::parse(opts.target("Mnemonic")?)?;
    let config = opts.game_config()?;
    let oracle = BalanceOracle::with_defaults(&config.http)?;
    let scanner = ScanCoordinator::new(config.scan, Arc::new(oracle));

    let shutdown = install_signal_handlers();
    let cancel = shutdown.round_token();
    let (progress, rx) = progress_channel();
    let reporter = tokio::spawn(report_progress(rx, cancel.clone()));

    let outcome = scanner.survey(&phrase, scanner.config().address_count, &cancel, &progress).await;
    cancel.cancel();
    let _ = reporter.await;
    let outcome = outcome?;
    Ok(json!({
        "active_count": outcome.active_count(),
        "total_sats": outcome.total_sats(),
        "active": outcome.active,
        "unverified": outcome.unverified,
        "checked": outcome.checked,
    }))
}

async fn cmd_play(opts: &ParsedArgs) -> Result<Value> {
    let config = opts.game_config()?;
    let game = Game::new(config)?;
    let shutdown = install_signal_handlers();
    let cancel = shutdown.round_token();

    let round = game.open_round().await?;
    let invoice = round.invoice().clone();
    eprintln!("{}", render(&json!({ "round": round.id(), "pay": invoice }), true));

    let round = if invoice.verify_url.is_some() {
        info!(round = %round.id(), "waiting for payment");
        match game.confirm_payment(round, &cancel).await? {
            Payment::Paid(round) => round,
            Payment::Failed(finished) => return Ok(serde_json::to_value(finished.summary())?),
        }
    } else {
        warn!(round = %round.id(), "invoice has no verify URL, waiting for manual confirmation");
        if !confirm_manually(&cancel).await? {
            return Err(GameError::Cancelled.into());
        }
        round.paid()
    };

    let (progress, rx) = progress_channel();
    let reporter = tokio::spawn(report_progress(rx, cancel.clone()));
    let finished = game.run_scan(round, &cancel, &progress).await;
    cancel.cancel();
    let _ = reporter.await;

    Ok(serde_json::to_value(finished?.summary())?)
}

/// Wait for the player to press Enter. `false` when cancelled first.
async fn confirm_manually(cancel: &CancellationToken) -> Result<bool> {
    eprint!("Press Enter once the invoice is paid... ");
    std::io::stderr().flush().ok();
    let read = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| ())
    });
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(false),
        result = read => {
            result.context("stdin reader failed")?.context("Failed to read stdin")?;
            Ok(true)
        }
    }
}

async fn report_progress(mut rx: watch::Receiver<ScanProgress>, done: CancellationToken) {
    loop {
        tokio::select! {
            _ = done.cancelled() => return,
            changed = rx.changed() => {
                if changed.is_err() {
                    return;
                }
                let p = rx.borrow_and_update().clone();
                info!(percent = p.percent, step = p.step, total = p.total_steps, "{}", p.message);
            }
        }
    }
}
