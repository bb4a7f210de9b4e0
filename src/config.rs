use crate::audio::SessionConfig;
use clap::Parser;
use std::time::Duration;
use sway_protocol::SWAYSOCK_ENV;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {option}: {reason}")]
    Invalid { option: String, reason: String },
}

impl ConfigError {
    fn invalid(option: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            option: option.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "barstat")]
#[command(about = "Status line generator for swaybar and i3bar")]
#[command(long_about = "
Prints one status line per second on stdout: memory, CPU, temperature, disk,
network throughput, output volume, keyboard layout and battery.

EXAMPLES:
  # Use as swaybar status_command
  status_command barstat --net-iface wlan0

  # Print a single line and exit
  barstat --once
")]
pub struct Args {
    /// Seconds between two stats samples
    #[arg(long, env = "BARSTAT_INTERVAL", default_value = "2")]
    pub interval: u64,

    /// Network interface to report (default: first non-loopback interface)
    #[arg(long, env = "BARSTAT_NET_IFACE")]
    pub net_iface: Option<String>,

    /// Battery name under /sys/class/power_supply
    #[arg(long, env = "BARSTAT_BATTERY", default_value = "BAT0")]
    pub battery: String,

    /// Environment variable holding the window manager IPC socket path
    #[arg(long, env = "BARSTAT_SOCKET_ENV", default_value = SWAYSOCK_ENV)]
    pub socket_env: String,

    /// Print one line and exit
    #[arg(long)]
    pub once: bool,

    /// How long a volume reading is reused
    #[arg(long, env = "BARSTAT_VOLUME_TTL_MS", default_value = "2000")]
    pub volume_ttl_ms: u64,

    /// Budget for connecting to the audio service
    #[arg(long, env = "BARSTAT_AUDIO_INIT_TIMEOUT_MS", default_value = "2000")]
    pub audio_init_timeout_ms: u64,

    /// Budget for resolving the default sink
    #[arg(long, env = "BARSTAT_SERVER_INFO_TIMEOUT_MS", default_value = "500")]
    pub server_info_timeout_ms: u64,

    /// Budget for the sink volume query
    #[arg(long, env = "BARSTAT_VOLUME_TIMEOUT_MS", default_value = "400")]
    pub volume_timeout_ms: u64,

    /// Read/write timeout on the window manager socket
    #[arg(long, env = "BARSTAT_IPC_TIMEOUT_MS", default_value = "500")]
    pub ipc_timeout_ms: u64,
}

/// Validated runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarConfig {
    pub interval: Duration,
    pub net_iface: Option<String>,
    pub battery: String,
    pub socket_env: String,
    pub once: bool,
    pub audio: SessionConfig,
    pub ipc_timeout: Duration,
}

impl Default for BarConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            net_iface: None,
            battery: "BAT0".to_string(),
            socket_env: SWAYSOCK_ENV.to_string(),
            once: false,
            audio: SessionConfig::default(),
            ipc_timeout: sway_protocol::client::DEFAULT_IO_TIMEOUT,
        }
    }
}

impl TryFrom<Args> for BarConfig {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, ConfigError> {
        let config = BarConfig {
            interval: Duration::from_secs(args.interval),
            net_iface: args.net_iface.filter(|iface| !iface.trim().is_empty()),
            battery: args.battery,
            socket_env: args.socket_env,
            once: args.once,
            audio: SessionConfig {
                cache_ttl: Duration::from_millis(args.volume_ttl_ms),
                init_timeout: Duration::from_millis(args.audio_init_timeout_ms),
                server_info_timeout: Duration::from_millis(args.server_info_timeout_ms),
                volume_timeout: Duration::from_millis(args.volume_timeout_ms),
            },
            ipc_timeout: Duration::from_millis(args.ipc_timeout_ms),
        };
        config.validate()?;
        Ok(config)
    }
}

impl BarConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::invalid("interval", "must be at least 1 second"));
        }
        if self.battery.trim().is_empty() {
            return Err(ConfigError::invalid("battery", "name cannot be empty"));
        }
        if self.socket_env.trim().is_empty() {
            return Err(ConfigError::invalid(
                "socket-env",
                "variable name cannot be empty",
            ));
        }
        if self.audio.volume_timeout >= self.interval {
            return Err(ConfigError::invalid(
                "volume-timeout-ms",
                format!(
                    "{:?} would stall a {:?} stats interval",
                    self.audio.volume_timeout, self.interval
                ),
            ));
        }
        if self.ipc_timeout.is_zero() {
            // Zero means "no timeout" to the socket layer
            return Err(ConfigError::invalid("ipc-timeout-ms", "must be non-zero"));
        }
        Ok(())
    }
}

/// Parse command line and environment into a validated config
pub fn load_config() -> Result<BarConfig, ConfigError> {
    match BarConfig::try_from(Args::parse()) {
        Ok(config) => {
            log::debug!("Loaded configuration: {:?}", config);
            Ok(config)
        }
        Err(e) => {
            log::error!("Configuration error: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["barstat"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = BarConfig::try_from(parse(&[])).unwrap();
        assert_eq!(config, BarConfig::default());
        assert_eq!(config.audio.cache_ttl, Duration::from_secs(2));
        assert_eq!(config.audio.volume_timeout, Duration::from_millis(400));
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = BarConfig::try_from(parse(&[
            "--interval",
            "5",
            "--net-iface",
            "wlan0",
            "--battery",
            "BAT1",
            "--once",
            "--volume-timeout-ms",
            "250",
        ]))
        .unwrap();

        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.net_iface.as_deref(), Some("wlan0"));
        assert_eq!(config.battery, "BAT1");
        assert!(config.once);
        assert_eq!(config.audio.volume_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_validation() {
        assert!(BarConfig::try_from(parse(&["--interval", "0"])).is_err());
        assert!(BarConfig::try_from(parse(&["--battery", " "])).is_err());
        assert!(BarConfig::try_from(parse(&["--socket-env", ""])).is_err());
        assert!(BarConfig::try_from(parse(&["--ipc-timeout-ms", "0"])).is_err());

        match BarConfig::try_from(parse(&["--interval", "1", "--volume-timeout-ms", "1000"])) {
            Err(ConfigError::Invalid { option, .. }) => assert_eq!(option, "volume-timeout-ms"),
            other => panic!("expected invalid volume timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_interface_means_auto() {
        let config = BarConfig::try_from(parse(&["--net-iface", ""])).unwrap();
        assert_eq!(config.net_iface, None);
    }
}
