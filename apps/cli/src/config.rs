use std::{collections::BTreeMap, fs, io::ErrorKind, path::Path, time::Duration};

use alloy_primitives::Address;
use anyhow::Context;
use funding::Contracts;
use ledger_client::rpc::ProviderConfig;
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "funding.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub rpc_url: String,
    /// Node- or wallet-managed account used for signing.
    pub account: Option<Address>,
    pub poll_interval_ms: u64,
    pub receipt_timeout_secs: u64,
    pub metadata_url: String,
    pub metadata_token: Option<String>,
    pub contracts: BTreeMap<String, Address>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".into(),
            account: None,
            poll_interval_ms: 4_000,
            receipt_timeout_secs: 300,
            metadata_url: "https://api.pinata.cloud".into(),
            metadata_token: None,
            contracts: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            log_poll_interval: Duration::from_millis(self.poll_interval_ms),
            receipt_timeout: Duration::from_secs(self.receipt_timeout_secs),
            ..ProviderConfig::default()
        }
    }

    pub fn contracts(&self) -> anyhow::Result<Contracts> {
        Contracts::from_table(&self.contracts).context("invalid [contracts] table")
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    rpc_url: Option<String>,
    account: Option<Address>,
    poll_interval_ms: Option<u64>,
    receipt_timeout_secs: Option<u64>,
    metadata_url: Option<String>,
    metadata_token: Option<String>,
    contracts: BTreeMap<String, Address>,
}

/// Reads `path` if it exists, then applies `APP__*` environment overrides.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("failed to parse '{}'", path.display()))?,
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read '{}'", path.display()));
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileConfig = toml::from_str(raw)?;

    if let Some(v) = file_cfg.rpc_url {
        settings.rpc_url = v;
    }
    if file_cfg.account.is_some() {
        settings.account = file_cfg.account;
    }
    if let Some(v) = file_cfg.poll_interval_ms {
        settings.poll_interval_ms = v;
    }
    if let Some(v) = file_cfg.receipt_timeout_secs {
        settings.receipt_timeout_secs = v;
    }
    if let Some(v) = file_cfg.metadata_url {
        settings.metadata_url = v;
    }
    if file_cfg.metadata_token.is_some() {
        settings.metadata_token = file_cfg.metadata_token;
    }
    settings.contracts.extend(file_cfg.contracts);

    Ok(())
}

fn apply_env(
    settings: &mut Settings,
    var: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = var("APP__RPC_URL") {
        settings.rpc_url = v;
    }

    if let Some(v) = var("APP__ACCOUNT") {
        let account = v
            .parse::<Address>()
            .with_context(|| format!("APP__ACCOUNT is not an address: '{v}'"))?;
        settings.account = Some(account);
    }

    if let Some(v) = var("APP__POLL_INTERVAL_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.poll_interval_ms = parsed;
        }
    }

    if let Some(v) = var("APP__RECEIPT_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.receipt_timeout_secs = parsed;
        }
    }

    if let Some(v) = var("APP__METADATA_URL") {
        settings.metadata_url = v;
    }
    if let Some(v) = var("APP__METADATA_TOKEN") {
        settings.metadata_token = Some(v);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use funding::ContractName;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn file_values_override_defaults() {
        let mut settings = Settings::default();
        apply_file(
            &mut settings,
            r#"
rpc_url = "http://node:8545"
poll_interval_ms = 1500

[contracts]
TerminalV1 = "0x1111111111111111111111111111111111111111"
TicketBooth = "0x2222222222222222222222222222222222222222"
"#,
        )
        .expect("toml");

        assert_eq!(settings.rpc_url, "http://node:8545");
        assert_eq!(settings.poll_interval_ms, 1500);
        assert_eq!(settings.receipt_timeout_secs, 300);
        let contracts = settings.contracts().expect("contracts");
        assert_eq!(
            contracts.address(ContractName::TicketBooth),
            Ok(Address::repeat_byte(0x22))
        );
    }

    #[test]
    fn env_overrides_file() {
        let mut settings = Settings::default();
        apply_file(&mut settings, "rpc_url = \"http://file:8545\"").expect("toml");
        apply_env(
            &mut settings,
            vars(&[
                ("APP__RPC_URL", "http://env:8545"),
                ("APP__ACCOUNT", "0x0000000000000000000000000000000000000abc"),
                ("APP__RECEIPT_TIMEOUT_SECS", "60"),
                ("APP__POLL_INTERVAL_MS", "not-a-number"),
                ("APP__METADATA_TOKEN", "jwt"),
            ]),
        )
        .expect("env");

        assert_eq!(settings.rpc_url, "http://env:8545");
        assert!(settings.account.is_some());
        assert_eq!(settings.receipt_timeout_secs, 60);
        assert_eq!(settings.poll_interval_ms, 4_000);
        assert_eq!(settings.metadata_token.as_deref(), Some("jwt"));
        assert_eq!(
            settings.provider_config().receipt_timeout,
            Duration::from_secs(60)
        );
    }

    #[test]
    fn invalid_account_is_an_error() {
        let mut settings = Settings::default();
        let err = apply_env(&mut settings, vars(&[("APP__ACCOUNT", "alice")]))
            .expect_err("bad account");
        assert!(err.to_string().contains("APP__ACCOUNT"));
    }

    #[test]
    fn unknown_contract_name_is_reported() {
        let mut settings = Settings::default();
        settings
            .contracts
            .insert("Juicer".into(), Address::repeat_byte(0x01));
        assert!(settings.contracts().is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("funding_cli_missing_{suffix}.toml"));

        let settings = load_settings(&path).expect("defaults");
        assert_eq!(settings.metadata_url, Settings::default().metadata_url);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("funding_cli_bad_{suffix}.toml"));
        fs::write(&path, "rpc_url = [").expect("write");

        let err = load_settings(&path).expect_err("malformed");
        assert!(err.to_string().contains("failed to parse"));

        fs::remove_file(path).expect("cleanup");
    }
}
