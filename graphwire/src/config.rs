//! Stream and channel configuration.
//!
//! A [`Config`] is plain instance state: streams and channels copy what they
//! need when constructed, so two channels never observe each other's settings.
//!
//! ```
//! # use {graphwire::config::Config, std::time::Duration};
//! let config = Config::from_options("buffer_size=1024; write_timeout_ms=250").unwrap();
//! assert_eq!(config.buffer_capacity, 1024);
//! assert_eq!(config.write_timeout, Duration::from_millis(250));
//! ```
use {
    crate::error::{invalid_option, Result},
    core::time::Duration,
};

/// Default stream buffer capacity in bytes.
pub const DEFAULT_BUFFER_CAPACITY: usize = 65_534;
/// Default deadline for blocking-style reads and writes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default limit on nested composites.
pub const DEFAULT_MAX_DEPTH: usize = 512;
/// Default limit on a single counted byte run read from the wire (4 MiB).
pub const DEFAULT_PREALLOCATION_LIMIT: usize = 4 << 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Initial capacity of a stream's buffer. Tokens read with
    /// `read_to_delimiter` must fit in it. Text channels grow it up to
    /// `preallocation_limit` for longer records.
    pub buffer_capacity: usize,
    /// Deadline used by channels while waiting for input.
    pub read_timeout: Duration,
    /// Deadline used by `write_all` when the caller gives none.
    pub write_timeout: Duration,
    /// Maximum number of nested composites in one session.
    pub max_depth: usize,
    /// Largest counted byte run a reader will allocate.
    pub preallocation_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            read_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
            max_depth: DEFAULT_MAX_DEPTH,
            preallocation_limit: DEFAULT_PREALLOCATION_LIMIT,
        }
    }
}

impl Config {
    pub const fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub const fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub const fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub const fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub const fn with_preallocation_limit(mut self, limit: usize) -> Self {
        self.preallocation_limit = limit;
        self
    }

    /// Build a configuration from `name=value` pairs on top of the defaults.
    ///
    /// Pairs are separated by whitespace, `;` or `,`. Recognized names are
    /// `buffer_size`, `read_timeout_ms`, `write_timeout_ms`, `max_depth` and
    /// `preallocation_limit`.
    pub fn from_options(options: &str) -> Result<Self> {
        let mut config = Self::default();
        config.apply_options(options)?;
        Ok(config)
    }

    /// Apply `name=value` pairs to an existing configuration.
    pub fn apply_options(&mut self, options: &str) -> Result<()> {
        let pairs = options
            .split(|c: char| c.is_whitespace() || c == ';' || c == ',')
            .filter(|pair| !pair.is_empty());
        for pair in pairs {
            let Some((name, value)) = pair.split_once('=') else {
                return Err(invalid_option(pair, "expected name=value"));
            };
            let number = value
                .trim()
                .parse::<u64>()
                .map_err(|e| invalid_option(name, e.to_string()))?;
            match name.trim() {
                "buffer_size" => {
                    if number == 0 {
                        return Err(invalid_option(name, "buffer size must be positive"));
                    }
                    self.buffer_capacity = to_usize(name, number)?;
                }
                "read_timeout_ms" => self.read_timeout = Duration::from_millis(number),
                "write_timeout_ms" => self.write_timeout = Duration::from_millis(number),
                "max_depth" => self.max_depth = to_usize(name, number)?,
                "preallocation_limit" => self.preallocation_limit = to_usize(name, number)?,
                _ => return Err(invalid_option(name, "unknown option")),
            }
        }
        Ok(())
    }
}

fn to_usize(name: &str, value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| invalid_option(name, "value does not fit in usize"))
}

#[cfg(test)]
mod tests {
    use {super::*, crate::error::Error};

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.buffer_capacity, DEFAULT_BUFFER_CAPACITY);
        assert_eq!(config.read_timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn parses_mixed_separators() {
        let config =
            Config::from_options("buffer_size=32,read_timeout_ms=5;\tmax_depth=8 preallocation_limit=64")
                .unwrap();
        assert_eq!(config.buffer_capacity, 32);
        assert_eq!(config.read_timeout, Duration::from_millis(5));
        assert_eq!(config.write_timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.preallocation_limit, 64);
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        assert!(matches!(
            Config::from_options("colour=blue"),
            Err(Error::InvalidOption { .. })
        ));
        assert!(matches!(
            Config::from_options("buffer_size"),
            Err(Error::InvalidOption { .. })
        ));
        assert!(matches!(
            Config::from_options("buffer_size=lots"),
            Err(Error::InvalidOption { .. })
        ));
        assert!(matches!(
            Config::from_options("buffer_size=0"),
            Err(Error::InvalidOption { .. })
        ));
    }

    #[test]
    fn empty_options_keep_defaults() {
        assert_eq!(Config::from_options("  ").unwrap(), Config::default());
    }
}
