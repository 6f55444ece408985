//! Process configuration. Loaded the same way the teacher's service loads
//! its settings: `.env` search via `dotenv`, overridden by process
//! environment variables, typed defaults for every field.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use crate::dnd::DndGate;
use crate::fatigue::FatigueCaps;

#[derive(Debug, Clone, Parser)]
#[command(name = "notify-engine", about = "Notification prioritization core")]
pub struct Config {
    /// Address the HTTP surface binds to.
    #[arg(long, env = "NOTIFY_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Path to the JSON rules file (§6's rules backing store).
    #[arg(long, env = "NOTIFY_RULES_PATH", default_value = "rules.json")]
    pub rules_path: PathBuf,

    /// Rules hot-reload interval in seconds.
    #[arg(long, env = "NOTIFY_RULES_RELOAD_SECS", default_value_t = 30)]
    pub rules_reload_secs: u64,

    /// DND window start hour, local.
    #[arg(long, env = "NOTIFY_DND_START_HOUR", default_value_t = 23)]
    pub dnd_start_hour: u32,

    /// DND window end hour, local.
    #[arg(long, env = "NOTIFY_DND_END_HOUR", default_value_t = 8)]
    pub dnd_end_hour: u32,

    #[arg(long, env = "NOTIFY_FATIGUE_TOTAL_CAP", default_value_t = 5)]
    pub fatigue_total_cap: u32,

    #[arg(long, env = "NOTIFY_FATIGUE_TOTAL_WINDOW_SECS", default_value_t = 3600)]
    pub fatigue_total_window_secs: i64,

    #[arg(long, env = "NOTIFY_FATIGUE_SOURCE_CAP", default_value_t = 2)]
    pub fatigue_source_cap: u32,

    #[arg(long, env = "NOTIFY_FATIGUE_SOURCE_WINDOW_SECS", default_value_t = 3600)]
    pub fatigue_source_window_secs: i64,

    #[arg(long, env = "NOTIFY_FATIGUE_PROMO_CAP", default_value_t = 1)]
    pub fatigue_promo_cap: u32,

    #[arg(long, env = "NOTIFY_FATIGUE_PROMO_WINDOW_SECS", default_value_t = 14400)]
    pub fatigue_promo_window_secs: i64,

    /// AI enrichment endpoint. Absent ⇒ the deterministic mock is used.
    #[arg(long, env = "NOTIFY_AI_ENDPOINT")]
    pub ai_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        // clap's derive doesn't give us a plain `Default`; parse against an
        // empty argv so every field falls back to its declared default.
        Config::parse_from(std::iter::empty::<String>())
    }
}

impl Config {
    pub fn dnd_gate(&self) -> DndGate {
        DndGate {
            start_hour: self.dnd_start_hour,
            end_hour: self.dnd_end_hour,
        }
    }

    pub fn fatigue_caps(&self) -> FatigueCaps {
        FatigueCaps {
            total_count: self.fatigue_total_cap,
            total_window_ms: self.fatigue_total_window_secs * 1000,
            per_source_count: self.fatigue_source_cap,
            per_source_window_ms: self.fatigue_source_window_secs * 1000,
            promo_count: self.fatigue_promo_cap,
            promo_window_ms: self.fatigue_promo_window_secs * 1000,
        }
    }

    pub fn rules_reload_interval(&self) -> Duration {
        Duration::from_secs(self.rules_reload_secs)
    }
}

/// Mirrors the teacher's `load_env`: a standard dotenv search plus an
/// explicit fallback at the crate's manifest directory, so running from an
/// unexpected working directory doesn't silently skip configuration.
pub fn load_env() {
    let _ = dotenv::dotenv();

    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    for candidate in [manifest_dir.join(".env"), manifest_dir.join("../.env")] {
        if candidate.exists() {
            let _ = dotenv::from_path(&candidate);
        }
    }
}

/// Mirrors the teacher's `init_tracing`: `RUST_LOG` env override, falling
/// back to a crate-scoped default directive.
pub fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notify_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
