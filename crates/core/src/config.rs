use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `FUNNEL_DISPATCH__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub rate: RateLimitConfig,
    #[serde(default)]
    pub sms: SmsProviderConfig,
    #[serde(default)]
    pub email: EmailProviderConfig,
    #[serde(default)]
    pub extension: ExtensionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between dispatch cycles.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    /// An active campaign completes once every recipient is terminal and no
    /// new recipient has appeared for this long.
    #[serde(default = "default_quiet_period_secs")]
    pub quiet_period_secs: u64,
    /// Maximum delivery attempts per recipient (first send + retries).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base of the exponential retry backoff, in seconds.
    #[serde(default = "default_retry_backoff_base_secs")]
    pub retry_backoff_base_secs: u64,
    /// Upper bound on a single adapter send, after which the attempt is
    /// recorded as failed with error_detail="timeout".
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

/// Sends-per-minute ceilings, scoped per channel-provider credential — that
/// is the resource actually constrained externally.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_sms_per_minute")]
    pub sms_per_minute: u64,
    #[serde(default = "default_whatsapp_per_minute")]
    pub whatsapp_per_minute: u64,
    #[serde(default = "default_email_per_minute")]
    pub email_per_minute: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmsProviderConfig {
    #[serde(default = "default_sms_account_sid")]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "default_sms_from_number")]
    pub from_number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_email_from")]
    pub from_email: String,
    #[serde(default = "default_email_from_name")]
    pub from_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionConfig {
    /// The browser extension counts as connected iff its last heartbeat is
    /// within this window.
    #[serde(default = "default_freshness_window_secs")]
    pub freshness_window_secs: u64,
}

// Default functions
fn default_node_id() -> String {
    "dispatch-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_tick_interval_secs() -> u64 {
    10
}
fn default_quiet_period_secs() -> u64 {
    300
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_backoff_base_secs() -> u64 {
    30
}
fn default_send_timeout_secs() -> u64 {
    10
}
fn default_sms_per_minute() -> u64 {
    60
}
fn default_whatsapp_per_minute() -> u64 {
    20
}
fn default_email_per_minute() -> u64 {
    600
}
fn default_sms_account_sid() -> String {
    "AC_dev_sid".to_string()
}
fn default_sms_from_number() -> String {
    "+15550000000".to_string()
}
fn default_email_from() -> String {
    "no-reply@funnel-dispatch.dev".to_string()
}
fn default_email_from_name() -> String {
    "Funnel Dispatch".to_string()
}
fn default_freshness_window_secs() -> u64 {
    120
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            quiet_period_secs: default_quiet_period_secs(),
            max_attempts: default_max_attempts(),
            retry_backoff_base_secs: default_retry_backoff_base_secs(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            sms_per_minute: default_sms_per_minute(),
            whatsapp_per_minute: default_whatsapp_per_minute(),
            email_per_minute: default_email_per_minute(),
        }
    }
}

impl Default for SmsProviderConfig {
    fn default() -> Self {
        Self {
            account_sid: default_sms_account_sid(),
            auth_token: String::new(),
            from_number: default_sms_from_number(),
        }
    }
}

impl Default for EmailProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            from_email: default_email_from(),
            from_name: default_email_from_name(),
        }
    }
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            freshness_window_secs: default_freshness_window_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            scheduler: SchedulerConfig::default(),
            rate: RateLimitConfig::default(),
            sms: SmsProviderConfig::default(),
            email: EmailProviderConfig::default(),
            extension: ExtensionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("FUNNEL_DISPATCH")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
