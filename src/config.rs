//! Configuration loading.
//!
//! All settings come from environment variables (optionally via a `.env`
//! file loaded in `main`). VAPID keys and the contact address are required;
//! their absence is a fatal startup error, not something to recover from at
//! runtime.
//!
//! | Variable | Default |
//! |---|---|
//! | `VAPID_PUBLIC_KEY` | required |
//! | `VAPID_PRIVATE_KEY` | required |
//! | `MAILTO_URL` | required |
//! | `HOST` | `0.0.0.0` |
//! | `PORT` | `5000` |
//! | `EZNOTIF_DATA_FILE` | `<data dir>/eznotif/subscriptions.json` |
//! | `EZNOTIF_PUBLIC_DIR` | unset (no static files) |
//! | `EZNOTIF_SEND_TIMEOUT_SECS` | `10` |
//! | `EZNOTIF_PUSH_TTL` | `86400` |

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::constants::{
    APP_DIR_NAME, DEFAULT_HOST, DEFAULT_PORT, PUSH_TTL_SECS, SEND_TIMEOUT, SUBSCRIPTIONS_FILE,
};
use crate::notifications::sender::DeliveryOptions;
use crate::notifications::vapid::VapidKeys;

/// Runtime configuration for the eznotif server.
#[derive(Clone, Debug)]
pub struct Config {
    /// Validated VAPID keypair.
    pub vapid: VapidKeys,
    /// VAPID `sub` claim (`mailto:` or `https:`).
    pub contact: String,
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Subscription store file.
    pub data_file: PathBuf,
    /// Optional static asset directory served with SPA fallback.
    pub public_dir: Option<PathBuf>,
    /// Per-send timeout.
    pub send_timeout: Duration,
    /// Push message TTL in seconds.
    pub push_ttl: u32,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let (Some(public_key), Some(private_key)) = (get("VAPID_PUBLIC_KEY"), get("VAPID_PRIVATE_KEY"))
        else {
            anyhow::bail!("VAPID keys are missing: set VAPID_PUBLIC_KEY and VAPID_PRIVATE_KEY (see `eznotif generate-vapid-keys`)");
        };
        let vapid = VapidKeys::from_base64url(&public_key, &private_key)
            .context("Invalid VAPID keys in environment")?;

        let contact = get("MAILTO_URL").context("MAILTO_URL is missing: set a mailto: or https: contact")?;
        anyhow::ensure!(
            contact.starts_with("mailto:") || contact.starts_with("https://"),
            "MAILTO_URL must start with mailto: or https://, got {contact:?}"
        );

        let port = match get("PORT") {
            Some(port) => port.parse::<u16>().with_context(|| format!("Invalid PORT {port:?}"))?,
            None => DEFAULT_PORT,
        };

        let send_timeout = match get("EZNOTIF_SEND_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(
                secs.parse::<u64>()
                    .with_context(|| format!("Invalid EZNOTIF_SEND_TIMEOUT_SECS {secs:?}"))?,
            ),
            None => SEND_TIMEOUT,
        };
        anyhow::ensure!(!send_timeout.is_zero(), "EZNOTIF_SEND_TIMEOUT_SECS must be positive");

        let push_ttl = match get("EZNOTIF_PUSH_TTL") {
            Some(ttl) => ttl
                .parse::<u32>()
                .with_context(|| format!("Invalid EZNOTIF_PUSH_TTL {ttl:?}"))?,
            None => PUSH_TTL_SECS,
        };

        let data_file = get("EZNOTIF_DATA_FILE").map_or_else(default_data_file, PathBuf::from);

        Ok(Self {
            vapid,
            contact,
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            data_file,
            public_dir: get("EZNOTIF_PUBLIC_DIR").map(PathBuf::from),
            send_timeout,
            push_ttl,
        })
    }

    /// Delivery options derived from this configuration.
    pub fn delivery_options(&self) -> DeliveryOptions {
        DeliveryOptions {
            ttl: self.push_ttl,
            urgency: None,
            timeout: self.send_timeout,
        }
    }

    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Platform data directory (e.g. `~/.local/share/eznotif/subscriptions.json`).
fn default_data_file() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR_NAME).join(SUBSCRIPTIONS_FILE))
        .unwrap_or_else(|| {
            log::warn!("Could not determine data directory, using ./{SUBSCRIPTIONS_FILE}");
            PathBuf::from(SUBSCRIPTIONS_FILE)
        })
}
