use std::{env, fmt, time::Duration};

use latency_stats::{DEFAULT_BATCH_MESSAGES, DEFAULT_PERCENTILES};

const DEFAULT_WS_URL: &str = "wss://ws-feed.exchange.coinbase.com";
const DEFAULT_PRODUCTS: &str = "BTC-USD";
const DEFAULT_MODE: RunMode = RunMode::Ab;

const ENV_WS_URL: &str = "FEED_HARNESS_WS_URL";
const ENV_PRODUCTS: &str = "FEED_HARNESS_PRODUCTS";
const ENV_MESSAGES: &str = "FEED_HARNESS_MESSAGES";
const ENV_PERCENTILES: &str = "FEED_HARNESS_PERCENTILES";
const ENV_MODE: &str = "FEED_HARNESS_MODE";
const ENV_COLLECT_TIMEOUT: &str = "FEED_HARNESS_COLLECT_TIMEOUT_SECS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Two connections to the same feed, compared trade by trade.
    Ab,
    /// One connection, receive latency only.
    Single,
}

impl RunMode {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "ab" => Some(Self::Ab),
            "single" => Some(Self::Single),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ab => "ab",
            Self::Single => "single",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub ws_url: String,
    pub product_ids: Vec<String>,
    pub n_messages: usize,
    pub percentiles: Vec<u8>,
    pub mode: RunMode,
    pub collect_timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidWsUrl,
    InvalidProducts,
    InvalidMessages,
    InvalidPercentiles,
    InvalidMode,
    InvalidCollectTimeout,
    NonUnicode(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidWsUrl => {
                write!(f, "{ENV_WS_URL} must start with ws:// or wss://")
            }
            Self::InvalidProducts => {
                write!(f, "{ENV_PRODUCTS} must list at least one product id")
            }
            Self::InvalidMessages => {
                write!(f, "{ENV_MESSAGES} must be a positive integer")
            }
            Self::InvalidPercentiles => {
                write!(
                    f,
                    "{ENV_PERCENTILES} must be comma-separated integers between 1 and 99"
                )
            }
            Self::InvalidMode => write!(f, "{ENV_MODE} must be one of: ab, single"),
            Self::InvalidCollectTimeout => {
                write!(f, "{ENV_COLLECT_TIMEOUT} must be a positive number of seconds")
            }
            Self::NonUnicode(key) => write!(f, "{key} contains non-unicode data"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let ws_url = match read_env(ENV_WS_URL)? {
            Some(value) => {
                let value = value.trim().to_owned();
                if !(value.starts_with("ws://") || value.starts_with("wss://")) {
                    return Err(ConfigError::InvalidWsUrl);
                }
                value
            }
            None => DEFAULT_WS_URL.to_owned(),
        };

        let product_ids = parse_products(
            read_env(ENV_PRODUCTS)?
                .as_deref()
                .unwrap_or(DEFAULT_PRODUCTS),
        )
        .ok_or(ConfigError::InvalidProducts)?;

        let n_messages = match read_env(ENV_MESSAGES)? {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidMessages)?,
            None => DEFAULT_BATCH_MESSAGES,
        };

        let percentiles = match read_env(ENV_PERCENTILES)? {
            Some(value) => parse_percentiles(&value).ok_or(ConfigError::InvalidPercentiles)?,
            None => DEFAULT_PERCENTILES.to_vec(),
        };

        let mode = match read_env(ENV_MODE)? {
            Some(value) => RunMode::parse(value.trim()).ok_or(ConfigError::InvalidMode)?,
            None => DEFAULT_MODE,
        };

        let collect_timeout = match read_env(ENV_COLLECT_TIMEOUT)? {
            Some(value) => Some(
                value
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|secs| secs.is_finite() && *secs > 0.0)
                    .map(Duration::from_secs_f64)
                    .ok_or(ConfigError::InvalidCollectTimeout)?,
            ),
            None => None,
        };

        Ok(Self {
            ws_url,
            product_ids,
            n_messages,
            percentiles,
            mode,
            collect_timeout,
        })
    }
}

fn read_env(key: &'static str) -> Result<Option<String>, ConfigError> {
    match env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::NonUnicode(key)),
    }
}

fn parse_products(value: &str) -> Option<Vec<String>> {
    let products: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|product| !product.is_empty())
        .map(str::to_owned)
        .collect();

    (!products.is_empty()).then_some(products)
}

fn parse_percentiles(value: &str) -> Option<Vec<u8>> {
    let ranks = value
        .split(',')
        .map(|rank| rank.trim().parse::<u8>().ok().filter(|rank| (1..=99).contains(rank)))
        .collect::<Option<Vec<u8>>>()?;

    (!ranks.is_empty()).then_some(ranks)
}

#[cfg(test)]
mod tests {
    use std::{env, sync::Mutex, time::Duration};

    use super::{
        Config, ConfigError, RunMode, ENV_COLLECT_TIMEOUT, ENV_MESSAGES, ENV_MODE,
        ENV_PERCENTILES, ENV_PRODUCTS, ENV_WS_URL,
    };

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    struct EnvVarGuard {
        key: &'static str,
        previous: Option<std::ffi::OsString>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let previous = env::var_os(key);
            env::set_var(key, value);
            Self { key, previous }
        }

        fn unset(key: &'static str) -> Self {
            let previous = env::var_os(key);
            env::remove_var(key);
            Self { key, previous }
        }

        #[cfg(unix)]
        fn set_os(key: &'static str, value: std::ffi::OsString) -> Self {
            let previous = env::var_os(key);
            env::set_var(key, value);
            Self { key, previous }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.previous.take() {
                Some(value) => env::set_var(self.key, value),
                None => env::remove_var(self.key),
            }
        }
    }

    fn reset_config_env_baseline() -> [EnvVarGuard; 6] {
        [
            EnvVarGuard::unset(ENV_WS_URL),
            EnvVarGuard::unset(ENV_PRODUCTS),
            EnvVarGuard::unset(ENV_MESSAGES),
            EnvVarGuard::unset(ENV_PERCENTILES),
            EnvVarGuard::unset(ENV_MODE),
            EnvVarGuard::unset(ENV_COLLECT_TIMEOUT),
        ]
    }

    #[test]
    fn defaults_when_env_is_unset() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();

        let config = Config::from_env().unwrap();

        assert_eq!(config.ws_url, "wss://ws-feed.exchange.coinbase.com");
        assert_eq!(config.product_ids, ["BTC-USD"]);
        assert_eq!(config.n_messages, 100);
        assert_eq!(config.percentiles, [50, 90, 95, 99]);
        assert_eq!(config.mode, RunMode::Ab);
        assert_eq!(config.collect_timeout, None);
    }

    #[test]
    fn uses_overrides_from_env() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _url = EnvVarGuard::set(ENV_WS_URL, "ws://127.0.0.1:9001");
        let _products = EnvVarGuard::set(ENV_PRODUCTS, "BTC-USD, ETH-USD,");
        let _messages = EnvVarGuard::set(ENV_MESSAGES, "250");
        let _ranks = EnvVarGuard::set(ENV_PERCENTILES, "25, 75");
        let _mode = EnvVarGuard::set(ENV_MODE, "single");
        let _timeout = EnvVarGuard::set(ENV_COLLECT_TIMEOUT, "2.5");

        let config = Config::from_env().unwrap();

        assert_eq!(config.ws_url, "ws://127.0.0.1:9001");
        assert_eq!(config.product_ids, ["BTC-USD", "ETH-USD"]);
        assert_eq!(config.n_messages, 250);
        assert_eq!(config.percentiles, [25, 75]);
        assert_eq!(config.mode, RunMode::Single);
        assert_eq!(config.collect_timeout, Some(Duration::from_millis(2_500)));
    }

    #[test]
    fn returns_error_for_non_websocket_url() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_WS_URL, "https://example.com");

        assert_eq!(Config::from_env().unwrap_err(), ConfigError::InvalidWsUrl);
    }

    #[test]
    fn returns_error_for_blank_product_list() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_PRODUCTS, " , ");

        assert_eq!(Config::from_env().unwrap_err(), ConfigError::InvalidProducts);
    }

    #[test]
    fn returns_error_for_zero_messages() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_MESSAGES, "0");

        assert_eq!(Config::from_env().unwrap_err(), ConfigError::InvalidMessages);
    }

    #[test]
    fn returns_error_for_out_of_range_percentile() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_PERCENTILES, "50,100");

        assert_eq!(Config::from_env().unwrap_err(), ConfigError::InvalidPercentiles);
    }

    #[test]
    fn returns_error_for_invalid_mode() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_MODE, "both");

        assert_eq!(Config::from_env().unwrap_err(), ConfigError::InvalidMode);
    }

    #[test]
    fn returns_error_for_non_positive_timeout() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_COLLECT_TIMEOUT, "-1");

        assert_eq!(
            Config::from_env().unwrap_err(),
            ConfigError::InvalidCollectTimeout
        );
    }

    #[cfg(unix)]
    #[test]
    fn returns_error_for_non_unicode_env_var() {
        use std::os::unix::ffi::OsStringExt;

        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set_os(
            ENV_MODE,
            std::ffi::OsString::from_vec(vec![0x66, 0x6f, 0x80]),
        );

        assert_eq!(
            Config::from_env().unwrap_err(),
            ConfigError::NonUnicode(ENV_MODE)
        );
    }
}
