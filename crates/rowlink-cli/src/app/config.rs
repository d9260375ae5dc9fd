use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use rowlink::{
    DEFAULT_CACHE_PREFIX, DEFAULT_CONCURRENCY, ErrorPolicy, ImageSize, ImageType, PipelineConfig,
    SearchOptions,
};
use std::path::PathBuf;

/// Runtime configuration for the `rowlink` binary.
///
/// These settings control where records come from, how the key column is
/// resolved against Google Custom Search, how many lookups run at once, and
/// whether resolved links are cached. All values are parsed from CLI
/// arguments or environment variables, with defaults suitable for piping a
/// CSV through the tool unmodified.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "rowlink",
    version,
    about = "Resolve a key column of delimited records to image links, concurrently and in input order"
)]
pub struct CliArgs {
    /// Input path; `-` reads records from stdin.
    ///
    /// Environment variable: `INPUT`
    #[arg(short, long, env = "INPUT", default_value_t = String::from("-"))]
    pub input: String,

    /// Zero-based index of the field used as the lookup key.
    ///
    /// Environment variable: `KEY_COLUMN`
    #[arg(short = 'c', long, env = "KEY_COLUMN", default_value_t = 0)]
    pub key_column: usize,

    /// Single-byte field delimiter for input and output records.
    ///
    /// Environment variable: `DELIMITER`
    #[arg(short, long, env = "DELIMITER", default_value_t = String::from(","))]
    pub delimiter: String,

    /// Maximum number of lookups in flight at once.
    ///
    /// Environment variable: `CONCURRENCY`
    #[arg(short = 'n', long, env = "CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Per-record deadline in milliseconds, covering one record's cache
    /// probe, lookup, and cache write. A record over deadline fails; the run
    /// continues.
    ///
    /// Environment variable: `TASK_TIMEOUT_MS`
    #[arg(long, env = "TASK_TIMEOUT_MS", default_value_t = 5000)]
    pub task_timeout_ms: u64,

    /// What to do with records whose lookup failed: `skip` drops them,
    /// `emit-empty` emits them with an empty trailing field.
    ///
    /// Environment variable: `ON_ERROR`
    #[arg(long, env = "ON_ERROR", default_value_t = ErrorPolicy::Skip)]
    pub on_error: ErrorPolicy,

    /// Google Custom Search API key.
    ///
    /// Environment variable: `GOOGLE_API_KEY`
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Google Custom Search engine identifier (the `cx` request parameter).
    ///
    /// Environment variable: `GOOGLE_CSE_ID`
    #[arg(long, env = "GOOGLE_CSE_ID", hide_env_values = true)]
    pub search_engine_id: String,

    /// Restrict results to one image type: `clipart`, `face`, `lineart`,
    /// `news`, or `photo`. `undefined` disables the filter.
    ///
    /// Environment variable: `IMAGE_TYPE`
    #[arg(short = 't', long, env = "IMAGE_TYPE", default_value_t = ImageType::Undefined)]
    pub image_type: ImageType,

    /// Restrict results to one image size: `icon`, `small`, `medium`,
    /// `large`, `xlarge`, `xxlarge`, or `huge`. `undefined` disables the
    /// filter.
    ///
    /// Environment variable: `IMAGE_SIZE`
    #[arg(short = 's', long, env = "IMAGE_SIZE", default_value_t = ImageSize::Undefined)]
    pub image_size: ImageSize,

    /// Resolve this one key and print its first link instead of running the
    /// record pipeline. The cache is not consulted; zero results exit
    /// non-zero.
    #[arg(short, long)]
    pub query: Option<String>,

    /// Redis cache address as `host:port`; empty disables the remote cache.
    ///
    /// Environment variable: `REDIS_ADDR`
    #[arg(long, env = "REDIS_ADDR", default_value_t = String::new())]
    pub redis_addr: String,

    /// Redis database index.
    ///
    /// Environment variable: `REDIS_DB`
    #[arg(long, env = "REDIS_DB", default_value_t = 0)]
    pub redis_db: i64,

    /// Cache resolved links in process instead of Redis.
    ///
    /// Environment variable: `MEMORY_CACHE`
    #[arg(long, env = "MEMORY_CACHE", default_value_t = false)]
    pub memory_cache: bool,

    /// Namespace prefix for cache keys.
    ///
    /// Environment variable: `CACHE_PREFIX`
    #[arg(long, env = "CACHE_PREFIX", default_value_t = String::from(DEFAULT_CACHE_PREFIX))]
    pub cache_prefix: String,
}

/// Where the record stream comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
}

/// Which cache backs the pipeline's cache-aside layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    Disabled,
    Memory,
    Redis { addr: String, db: i64 },
}

/// Validated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub input: InputSource,
    pub query: Option<String>,
    pub api_key: String,
    pub engine_id: String,
    pub cache: CacheBackend,
    pub pipeline: PipelineConfig,
}

impl TryFrom<CliArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.concurrency == 0 {
            bail!("CONCURRENCY must be greater than 0");
        }
        if args.task_timeout_ms == 0 {
            bail!("TASK_TIMEOUT_MS must be greater than 0");
        }
        let delimiter = match args.delimiter.as_bytes() {
            [byte] => *byte,
            _ => bail!(
                "DELIMITER must be exactly one byte, got {:?}",
                args.delimiter
            ),
        };
        if args.api_key.trim().is_empty() {
            bail!("GOOGLE_API_KEY must not be empty");
        }
        if args.search_engine_id.trim().is_empty() {
            bail!("GOOGLE_CSE_ID must not be empty");
        }
        if args.memory_cache && !args.redis_addr.is_empty() {
            bail!("MEMORY_CACHE and REDIS_ADDR are mutually exclusive");
        }

        let cache = if args.memory_cache {
            CacheBackend::Memory
        } else if args.redis_addr.is_empty() {
            CacheBackend::Disabled
        } else {
            CacheBackend::Redis {
                addr: args.redis_addr,
                db: args.redis_db,
            }
        };

        let input = if args.input == "-" {
            InputSource::Stdin
        } else {
            InputSource::File(PathBuf::from(args.input))
        };

        Ok(Self {
            input,
            query: args.query,
            api_key: args.api_key,
            engine_id: args.search_engine_id,
            cache,
            pipeline: PipelineConfig {
                concurrency: args.concurrency,
                task_timeout: Duration::from_millis(args.task_timeout_ms),
                key_column: args.key_column,
                delimiter,
                on_error: args.on_error,
                search: SearchOptions {
                    image_type: args.image_type,
                    image_size: args.image_size,
                },
                cache_prefix: args.cache_prefix,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> CliArgs {
        CliArgs {
            input: "-".to_string(),
            key_column: 0,
            delimiter: ",".to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            task_timeout_ms: 5000,
            on_error: ErrorPolicy::Skip,
            api_key: "key".to_string(),
            search_engine_id: "cx".to_string(),
            image_type: ImageType::Undefined,
            image_size: ImageSize::Undefined,
            query: None,
            redis_addr: String::new(),
            redis_db: 0,
            memory_cache: false,
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
        }
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        CliArgs::command().debug_assert();
    }

    #[test]
    fn defaults_map_through() {
        let config = AppConfig::try_from(base_args()).unwrap();
        assert_eq!(config.input, InputSource::Stdin);
        assert_eq!(config.cache, CacheBackend::Disabled);
        assert_eq!(config.pipeline.delimiter, b',');
        assert_eq!(config.pipeline.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.pipeline.task_timeout, Duration::from_secs(5));
        assert_eq!(config.pipeline.on_error, ErrorPolicy::Skip);
        assert!(config.query.is_none());
    }

    #[test]
    fn rejects_zero_concurrency() {
        let args = CliArgs {
            concurrency: 0,
            ..base_args()
        };
        assert!(AppConfig::try_from(args).is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        let args = CliArgs {
            task_timeout_ms: 0,
            ..base_args()
        };
        assert!(AppConfig::try_from(args).is_err());
    }

    #[test]
    fn rejects_multi_byte_delimiters() {
        for delimiter in ["", ",,", "→"] {
            let args = CliArgs {
                delimiter: delimiter.to_string(),
                ..base_args()
            };
            assert!(AppConfig::try_from(args).is_err(), "accepted {delimiter:?}");
        }
    }

    #[test]
    fn rejects_blank_credentials() {
        let args = CliArgs {
            api_key: "  ".to_string(),
            ..base_args()
        };
        assert!(AppConfig::try_from(args).is_err());

        let args = CliArgs {
            search_engine_id: String::new(),
            ..base_args()
        };
        assert!(AppConfig::try_from(args).is_err());
    }

    #[test]
    fn rejects_conflicting_cache_backends() {
        let args = CliArgs {
            memory_cache: true,
            redis_addr: "127.0.0.1:6379".to_string(),
            ..base_args()
        };
        assert!(AppConfig::try_from(args).is_err());
    }

    #[test]
    fn selects_the_configured_cache_backend() {
        let args = CliArgs {
            memory_cache: true,
            ..base_args()
        };
        let config = AppConfig::try_from(args).unwrap();
        assert_eq!(config.cache, CacheBackend::Memory);

        let args = CliArgs {
            redis_addr: "127.0.0.1:6379".to_string(),
            redis_db: 3,
            ..base_args()
        };
        let config = AppConfig::try_from(args).unwrap();
        assert_eq!(
            config.cache,
            CacheBackend::Redis {
                addr: "127.0.0.1:6379".to_string(),
                db: 3,
            }
        );
    }

    #[test]
    fn file_inputs_become_paths() {
        let args = CliArgs {
            input: "rows.csv".to_string(),
            ..base_args()
        };
        let config = AppConfig::try_from(args).unwrap();
        assert_eq!(config.input, InputSource::File(PathBuf::from("rows.csv")));
    }

    #[test]
    fn filters_flow_into_search_options() {
        let args = CliArgs {
            image_type: ImageType::Photo,
            image_size: ImageSize::Large,
            ..base_args()
        };
        let config = AppConfig::try_from(args).unwrap();
        assert_eq!(config.pipeline.search.image_type, ImageType::Photo);
        assert_eq!(config.pipeline.search.image_size, ImageSize::Large);
    }
}
