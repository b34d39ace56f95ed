//! Subprocess-backed surface implementations
//!
//! The exchange ships a CLI for the control surface, the query surface is a
//! gRPC streaming endpoint driven through a JSONL-emitting client, and chain
//! utilities come from a `cast`-style tool. All invocations carry short
//! timeouts with `kill_on_drop`; a timeout is reported as a transport-class
//! error, never a crash.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use types::balance::DepositedBalances;
use types::ids::MarketId;
use types::market::{ConfigEnvelope, MarketContext, StackConfig};
use types::order::{OrderRow, OrderbookSnapshot, Side};
use types::trade::{TradeRow, TradeTape};

use super::{ChainSurface, ControlSurface, QuerySurface, SurfaceError};
use crate::trader::TraderIdentity;

/// Environment variable through which the exchange CLI reads the signing key.
const TRADER_KEY_ENV: &str = "TRADER_PRIVKEY";

/// Binaries, endpoints, and timeouts for the process-backed surfaces.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub stack_url: String,
    /// Exchange control CLI.
    pub cli_binary: PathBuf,
    /// JSONL-emitting gRPC client for the query surface.
    pub query_binary: PathBuf,
    /// Chain utility tool (address derivation, `balanceOf` calls).
    pub cast_binary: PathBuf,
    /// Optional proto descriptor handed to the query client.
    pub proto_file: Option<PathBuf>,
    pub orderbook_method: String,
    pub trades_method: String,
    pub control_timeout: Duration,
    pub query_timeout: Duration,
}

impl ProcessConfig {
    pub fn new(stack_url: impl Into<String>) -> Self {
        Self {
            stack_url: stack_url.into(),
            cli_binary: PathBuf::from("exchange-cli"),
            query_binary: PathBuf::from("grpcurl"),
            cast_binary: PathBuf::from("cast"),
            proto_file: None,
            orderbook_method: "exchange.gateway.v1.GatewayService.Orderbook".to_string(),
            trades_method: "exchange.gateway.v1.GatewayService.Trades".to_string(),
            control_timeout: Duration::from_secs(10),
            query_timeout: Duration::from_secs(3),
        }
    }

    /// Host:port form the query client expects (scheme stripped).
    fn grpc_endpoint(&self) -> String {
        self.stack_url
            .trim_start_matches("http://")
            .trim_start_matches("https://")
            .to_string()
    }

    fn use_tls(&self) -> bool {
        self.stack_url.starts_with("https://")
    }
}

/// All three external surfaces, backed by subprocess invocations.
#[derive(Debug, Clone)]
pub struct ProcessSurface {
    config: ProcessConfig,
}

impl ProcessSurface {
    pub fn new(config: ProcessConfig) -> Self {
        Self { config }
    }

    /// Build a control command: `<cli> --stack <url> <args…>`, signed with
    /// the trader's key when one is given.
    fn control_command(&self, trader: Option<&TraderIdentity>, args: &[&str]) -> (String, Command) {
        let mut cmd = Command::new(&self.config.cli_binary);
        cmd.arg("--stack").arg(&self.config.stack_url).args(args);
        if let Some(trader) = trader {
            cmd.env(TRADER_KEY_ENV, trader.key.expose());
        }
        let label = format!("{} {}", self.config.cli_binary.display(), args.join(" "));
        (label, cmd)
    }

    async fn run_control(
        &self,
        trader: Option<&TraderIdentity>,
        args: &[&str],
    ) -> Result<String, SurfaceError> {
        let (label, mut cmd) = self.control_command(trader, args);
        let output = run_to_completion(&label, &mut cmd, self.config.control_timeout).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Stream JSONL rows from the query client until the stream closes or
    /// the deadline passes; rows received before the deadline still count.
    async fn run_query(&self, request: serde_json::Value) -> Result<Vec<String>, SurfaceError> {
        let mut cmd = Command::new(&self.config.query_binary);
        if !self.config.use_tls() {
            cmd.arg("-plaintext");
        }
        if let Some(proto) = &self.config.proto_file {
            cmd.arg("-proto").arg(proto);
        }
        let method = request["method"].as_str().unwrap_or_default().to_string();
        let body = request["body"].to_string();
        cmd.arg("-d")
            .arg(&body)
            .arg(self.config.grpc_endpoint())
            .arg(&method);
        let label = format!("{} {}", self.config.query_binary.display(), method);

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| SurfaceError::Spawn {
            command: label.clone(),
            source,
        })?;
        let mut stdout = child.stdout.take().expect("stdout piped");

        let mut buf = Vec::new();
        let timeout = self.config.query_timeout;
        match tokio::time::timeout(timeout, stdout.read_to_end(&mut buf)).await {
            Ok(Ok(_)) => {
                let _ = child.wait().await;
            }
            Ok(Err(source)) => {
                return Err(SurfaceError::Spawn {
                    command: label,
                    source,
                });
            }
            Err(_) => {
                // Deadline hit while the stream was still open. Keep what
                // already arrived; with nothing buffered this is a timeout.
                let _ = child.start_kill();
                if buf.is_empty() {
                    return Err(SurfaceError::Timeout {
                        command: label,
                        timeout,
                    });
                }
            }
        }

        Ok(String::from_utf8_lossy(&buf)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    fn query_request(
        &self,
        method: &str,
        market: &MarketId,
        historical_field: &str,
        historical: bool,
        trader_filter: Option<&str>,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "continue_stream": true,
            "market_id": market.as_str(),
        });
        body[historical_field] = serde_json::Value::Bool(historical);
        if let Some(address) = trader_filter {
            body["filter_by_trader"] = serde_json::Value::String(address.to_string());
        }
        serde_json::json!({ "method": method, "body": body })
    }
}

#[async_trait]
impl ControlSurface for ProcessSurface {
    async fn status(&self) -> Result<(), SurfaceError> {
        self.run_control(None, &["status"]).await.map(|_| ())
    }

    async fn fetch_config(&self) -> Result<StackConfig, SurfaceError> {
        let stdout = self.run_control(None, &["config"]).await?;
        let envelope: ConfigEnvelope =
            serde_json::from_str(&stdout).map_err(|e| SurfaceError::Malformed {
                command: "config".to_string(),
                detail: e.to_string(),
            })?;
        Ok(envelope.config)
    }

    async fn deposited_balances(
        &self,
        trader: &TraderIdentity,
        market: &MarketContext,
    ) -> Result<DepositedBalances, SurfaceError> {
        let stdout = self.run_control(Some(trader), &["balance"]).await?;
        Ok(parse_balance_report(&stdout, market))
    }

    async fn deposit(
        &self,
        trader: &TraderIdentity,
        network: &str,
        token: &str,
        amount: Decimal,
    ) -> Result<(), SurfaceError> {
        let amount = amount.to_string();
        self.run_control(Some(trader), &["deposit", network, token, &amount])
            .await
            .map(|_| ())
    }

    async fn withdraw(
        &self,
        trader: &TraderIdentity,
        network: &str,
        token: &str,
        amount: Decimal,
    ) -> Result<(), SurfaceError> {
        let amount = amount.to_string();
        self.run_control(Some(trader), &["withdraw", network, token, &amount])
            .await
            .map(|_| ())
    }

    async fn place_order(
        &self,
        trader: &TraderIdentity,
        side: Side,
        market: &MarketId,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<Option<String>, SurfaceError> {
        let subcommand = match side {
            Side::Buy => "buy-limit",
            Side::Sell => "sell-limit",
        };
        let quantity = quantity.to_string();
        let price = price.to_string();
        let stdout = self
            .run_control(
                Some(trader),
                &[subcommand, market.as_str(), &quantity, &price],
            )
            .await?;
        Ok(extract_order_id(&stdout))
    }
}

#[async_trait]
impl QuerySurface for ProcessSurface {
    async fn orderbook(
        &self,
        market: &MarketId,
        historical: bool,
        trader_filter: Option<&str>,
    ) -> Result<OrderbookSnapshot, SurfaceError> {
        let request = self.query_request(
            &self.config.orderbook_method,
            market,
            "historical_open_orders",
            historical,
            trader_filter,
        );
        let lines = self.run_query(request).await?;
        let orders = parse_jsonl::<OrderRow>(&lines, &self.config.orderbook_method)?;
        Ok(OrderbookSnapshot::new(market.clone(), orders))
    }

    async fn trades(
        &self,
        market: &MarketId,
        historical: bool,
        trader_filter: Option<&str>,
    ) -> Result<TradeTape, SurfaceError> {
        let request = self.query_request(
            &self.config.trades_method,
            market,
            "historical_closed_trades",
            historical,
            trader_filter,
        );
        let lines = self.run_query(request).await?;
        let trades = parse_jsonl::<TradeRow>(&lines, &self.config.trades_method)?;
        Ok(TradeTape::new(market.clone(), trades))
    }
}

#[async_trait]
impl ChainSurface for ProcessSurface {
    async fn derive_address(&self, key: &str) -> Result<String, SurfaceError> {
        let mut cmd = Command::new(&self.config.cast_binary);
        cmd.args(["wallet", "address", key]);
        let label = format!("{} wallet address", self.config.cast_binary.display());
        let output = run_to_completion(&label, &mut cmd, self.config.control_timeout).await?;
        let address = String::from_utf8_lossy(&output.stdout)
            .trim()
            .to_lowercase();
        if address.is_empty() {
            return Err(SurfaceError::Malformed {
                command: label,
                detail: "empty address".to_string(),
            });
        }
        Ok(address)
    }

    async fn token_balance(
        &self,
        address: &str,
        token_address: &str,
        rpc_url: &str,
    ) -> Result<Decimal, SurfaceError> {
        let mut cmd = Command::new(&self.config.cast_binary);
        cmd.args([
            "call",
            token_address,
            "balanceOf(address)(uint256)",
            address,
            "--rpc-url",
            rpc_url,
        ]);
        let label = format!("{} call balanceOf", self.config.cast_binary.display());
        let output = run_to_completion(&label, &mut cmd, self.config.control_timeout).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_token_amount(&stdout).ok_or_else(|| SurfaceError::Malformed {
            command: label,
            detail: format!("unparseable balance: {:?}", stdout.trim()),
        })
    }
}

/// Run a command to completion under a deadline, requiring a zero exit.
async fn run_to_completion(
    label: &str,
    cmd: &mut Command,
    timeout: Duration,
) -> Result<std::process::Output, SurfaceError> {
    cmd.stdin(Stdio::null()).kill_on_drop(true);
    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| SurfaceError::Timeout {
            command: label.to_string(),
            timeout,
        })?
        .map_err(|source| SurfaceError::Spawn {
            command: label.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(SurfaceError::Command {
            command: label.to_string(),
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

fn parse_jsonl<T: serde::de::DeserializeOwned>(
    lines: &[String],
    command: &str,
) -> Result<Vec<T>, SurfaceError> {
    lines
        .iter()
        .map(|line| {
            serde_json::from_str(line).map_err(|e| SurfaceError::Malformed {
                command: command.to_string(),
                detail: format!("{e} in line {line:?}"),
            })
        })
        .collect()
}

/// Parse the CLI balance report. Lines look like `network: TOKEN: amount`;
/// the report covers every chain the trader touched, so rows are matched on
/// both the token symbol and the network name of each market leg.
fn parse_balance_report(report: &str, market: &MarketContext) -> DepositedBalances {
    let mut balances = DepositedBalances::default();
    for line in report.lines() {
        let amount = || -> Option<Decimal> {
            let parts: Vec<&str> = line.split(':').collect();
            if parts.len() < 3 {
                return None;
            }
            parts.last()?.trim().parse().ok()
        };
        if line.contains(&market.base_token) && line.contains(&market.base_network) {
            if let Some(value) = amount() {
                balances.base = value;
            }
        } else if line.contains(&market.quote_token) && line.contains(&market.quote_network) {
            if let Some(value) = amount() {
                balances.quote = value;
            }
        }
    }
    balances
}

/// Best-effort extraction of the order id from the CLI's confirmation text.
/// The CLI is not obliged to print one; `None` just leaves the model's
/// open-order list without this entry.
fn extract_order_id(stdout: &str) -> Option<String> {
    for line in stdout.lines() {
        let lower = line.to_ascii_lowercase();
        if lower.contains("order") && lower.contains("id") {
            let id = line.rsplit(':').next()?.trim();
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    }
    None
}

/// Parse a `balanceOf` reply. The tool prints either a decimal with an
/// annotation (`10000000 [1e7]`) or a hex quantity (`0xa`).
fn parse_token_amount(stdout: &str) -> Option<Decimal> {
    let token = stdout.split_whitespace().next()?;
    let value = if let Some(hex) = token.strip_prefix("0x") {
        u128::from_str_radix(hex, 16).ok()?
    } else {
        token.parse::<u128>().ok()?
    };
    Some(Decimal::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::MarketId as Mid;

    fn market() -> MarketContext {
        MarketContext {
            market_id: Mid::new("m-1"),
            base_network: "anvil-1".into(),
            quote_network: "anvil-2".into(),
            base_token: "TKA".into(),
            quote_token: "TKB".into(),
            base_token_address: "0xbase".into(),
            quote_token_address: "0xquote".into(),
            base_rpc_url: "http://localhost:8545".into(),
            quote_rpc_url: "http://localhost:8546".into(),
        }
    }

    #[test]
    fn test_parse_balance_report() {
        let report = "\
Balances for 0xabc
anvil-1: TKA: 10000
anvil-2: TKB: 25000
anvil-3: TKC: 99\n";
        let balances = parse_balance_report(report, &market());
        assert_eq!(balances.base, Decimal::from(10000));
        assert_eq!(balances.quote, Decimal::from(25000));
    }

    #[test]
    fn test_parse_balance_report_ignores_short_lines() {
        let report = "TKA: 10000\n";
        let balances = parse_balance_report(report, &market());
        assert_eq!(balances.base, Decimal::ZERO);
    }

    #[test]
    fn test_parse_token_amount_formats() {
        assert_eq!(
            parse_token_amount("10000000 [1e7]"),
            Some(Decimal::from(10_000_000u64))
        );
        assert_eq!(parse_token_amount("0xa"), Some(Decimal::from(10)));
        assert_eq!(parse_token_amount("42"), Some(Decimal::from(42)));
        assert_eq!(parse_token_amount("not-a-number"), None);
        assert_eq!(parse_token_amount(""), None);
    }

    #[test]
    fn test_extract_order_id() {
        assert_eq!(
            extract_order_id("Order id: 0199a7f2\n"),
            Some("0199a7f2".to_string())
        );
        assert_eq!(extract_order_id("accepted\n"), None);
    }

    #[test]
    fn test_query_request_shape() {
        let surface = ProcessSurface::new(ProcessConfig::new("http://localhost:50051"));
        let request = surface.query_request(
            "svc.Orderbook",
            &Mid::new("m-1"),
            "historical_open_orders",
            true,
            Some("0xabc"),
        );
        assert_eq!(request["body"]["market_id"], "m-1");
        assert_eq!(request["body"]["historical_open_orders"], true);
        assert_eq!(request["body"]["filter_by_trader"], "0xabc");
        assert_eq!(request["body"]["continue_stream"], true);
    }

    #[test]
    fn test_grpc_endpoint_strips_scheme() {
        let config = ProcessConfig::new("https://stack:50051");
        assert_eq!(config.grpc_endpoint(), "stack:50051");
        assert!(config.use_tls());
        let config = ProcessConfig::new("http://localhost:50051");
        assert!(!config.use_tls());
    }
}
