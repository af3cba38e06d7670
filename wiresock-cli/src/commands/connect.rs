use std::time::Duration;

use anyhow::{Error, Result};
use tokio::{
    io::{self, AsyncWrite, AsyncWriteExt},
    time::timeout,
};
use wiresock_core::{connect, tls::init_tls_client_config};

use crate::options::Options;

const LINE_TERMINATOR: &str = "\r\n";

/// Connect, send the message and copy the response to stdout.
pub async fn run(opts: Options) -> Result<()> {
    let mut stdout = io::stdout();
    run_with(&opts, &mut stdout).await
}

pub async fn run_with<W: AsyncWrite + Unpin>(opts: &Options, out: &mut W) -> Result<()> {
    let address = opts
        .address
        .clone()
        .ok_or_else(|| Error::msg("address is required"))?;

    if opts.tls {
        if let Some(cert) = opts.ca_cert.as_ref() {
            log::info!("loading TLS certificate from {}", cert);
        }
        init_tls_client_config(opts.ca_cert.as_deref())?;
    }

    let mut socket = connect(address, opts.socket_options())?;

    let info = timeout(Duration::from_secs(opts.timeout), socket.opened())
        .await
        .map_err(|_| {
            Error::msg(format!(
                "connect to {} timed out after {}s",
                socket.address(),
                opts.timeout
            ))
        })??;

    log::info!(
        "[{}] connected to {}, local address is {}",
        socket.address(),
        info.remote_address,
        info.local_address
    );

    let mut readable = socket
        .readable()
        .ok_or_else(|| Error::msg("readable side already taken"))?;
    let writable = socket
        .writable()
        .ok_or_else(|| Error::msg("writable side already taken"))?;

    if let Some(message) = opts.message.as_ref() {
        writable
            .write(format!("{}{}", message, LINE_TERMINATOR).as_bytes())
            .await?;
    }

    let mut total = 0;

    while let Some(chunk) = readable.read().await? {
        total += chunk.len();
        out.write_all(&chunk).await?;
        out.flush().await?;
    }

    log::info!("[{}] received {} bytes in total", socket.address(), total);

    socket.close().await;

    Ok(())
}
