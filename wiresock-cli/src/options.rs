use std::{fs, path::Path, str::FromStr};

use anyhow::{Context, Error, Result};
use clap::Parser;
use log::LevelFilter;
use wiresock_core::{SecureTransport, SocketAddress, SocketOptions};

const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

const DEFAULT_LOG_LEVEL: &str = "warn";

/// Send a line to a TCP/TLS server and print what comes back
#[derive(Parser, serde::Deserialize, Clone, Debug)]
#[clap(name = "wiresock", version, about)]
pub struct Options {
    /// Configuration file in YAML/JSON format, replaces all other options, [default: <empty>]
    #[clap(long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Remote address in <host>[:<port>] format, port defaults to 443
    pub address: Option<SocketAddress>,

    /// Message to send, a CRLF is appended
    pub message: Option<String>,

    /// Negotiate TLS right after connecting, [default: false]
    #[clap(long)]
    #[serde(default)]
    pub tls: bool,

    /// Keep the socket open after the remote ends its stream, [default: false]
    #[clap(long)]
    #[serde(default)]
    pub allow_half_open: bool,

    /// Extra certificate in DER format to trust, requires --tls, [default: <empty>]
    #[clap(long)]
    pub ca_cert: Option<String>,

    /// Seconds to wait for the connection to open
    #[clap(long, default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Log level, e.g, "error", "warn", "info", "debug" or "trace"
    #[clap(long, default_value = DEFAULT_LOG_LEVEL)]
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config: None,
            address: None,
            message: None,
            tls: false,
            allow_half_open: false,
            ca_cert: None,
            timeout: default_timeout(),
            log_level: default_log_level(),
        }
    }
}

impl Options {
    /// Replace every option with the content of `--config`, if set.
    pub fn try_load_from_file(&mut self) -> Result<()> {
        if let Some(config) = self.config.clone() {
            let mut file_opts = Self::from_file(&config)?;
            file_opts.config = Some(config);
            *self = file_opts;
        }
        Ok(())
    }

    /// Parse a `.yml`, `.yaml` or `.json` options file.
    pub fn from_file(path: &str) -> Result<Options> {
        let extension = Path::new(path).extension().and_then(|ext| ext.to_str());

        let parse: fn(&str) -> Result<Options> = match extension {
            Some("yml" | "yaml") => |raw| serde_yaml::from_str(raw).context("fail to load YAML config"),
            Some("json") => |raw| serde_json::from_str(raw).context("fail to load JSON config"),
            _ => {
                return Err(Error::msg(format!(
                    "invalid file format of {}, expect .yml, .yaml or .json",
                    path
                )))
            }
        };

        let raw = fs::read_to_string(path).with_context(|| format!("fail to read {}", path))?;

        parse(&raw)
    }

    pub fn socket_options(&self) -> SocketOptions {
        SocketOptions {
            secure_transport: if self.tls {
                SecureTransport::On
            } else {
                SecureTransport::Off
            },
            allow_half_open: self.allow_half_open,
        }
    }

    /// Configured log level, `warn` when unparsable.
    pub fn log_level(&self) -> LevelFilter {
        LevelFilter::from_str(&self.log_level).unwrap_or(LevelFilter::Warn)
    }
}

pub fn check_options(opts: &Options) -> Result<()> {
    if opts.address.is_none() {
        return Err(Error::msg("address is required"));
    }

    if opts.message.is_none() {
        return Err(Error::msg("message is required"));
    }

    if opts.ca_cert.is_some() && !opts.tls {
        return Err(Error::msg("--ca-cert requires --tls to be set"));
    }

    if opts.timeout == 0 {
        return Err(Error::msg("--timeout must be greater than 0"));
    }

    if LevelFilter::from_str(&opts.log_level).is_err() {
        return Err(Error::msg(format!("--log-level {} is invalid", opts.log_level)));
    }

    Ok(())
}
