use std::env;
use std::str::FromStr;

/// Tunables for [`Mp2tMediaParser`](crate::format::ts::Mp2tMediaParser).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Signal HE-AAC: the advertised audio sample rate is doubled (capped at 48 kHz).
    pub sbr_in_mimetype: bool,
    /// Number of consecutive failing packets after which a PID aborts the stream.
    pub max_consecutive_errors: u32,
    /// Number of sync bytes, 188 bytes apart, checked when resynchronizing.
    pub sync_packet_count: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            sbr_in_mimetype: false,
            max_consecutive_errors: 8,
            sync_packet_count: 4,
        }
    }
}

impl ParserConfig {
    /// Defaults overridden by `TSDEMUX_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(value) = env_value::<bool>("TSDEMUX_SBR_IN_MIMETYPE") {
            config.sbr_in_mimetype = value;
        }
        if let Some(value) = env_value::<u32>("TSDEMUX_MAX_CONSECUTIVE_ERRORS") {
            config.max_consecutive_errors = value.max(1);
        }
        if let Some(value) = env_value::<usize>("TSDEMUX_SYNC_PACKET_COUNT") {
            config.sync_packet_count = value.max(1);
        }

        config
    }

    pub fn with_sbr_in_mimetype(mut self, sbr_in_mimetype: bool) -> Self {
        self.sbr_in_mimetype = sbr_in_mimetype;
        self
    }

    pub fn with_max_consecutive_errors(mut self, count: u32) -> Self {
        self.max_consecutive_errors = count.max(1);
        self
    }
}

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring invalid value {:?} for {}", raw, key);
            None
        }
    }
}
