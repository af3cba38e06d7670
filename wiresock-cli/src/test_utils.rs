use std::net::SocketAddr;

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    sync::oneshot,
};

pub struct ServerContext {
    pub addr: SocketAddr,

    /// The line the server received, CRLF included.
    pub request: oneshot::Receiver<Vec<u8>>,
}

/// Serve a single connection: read one line, answer with `response`, then
/// close the connection.
pub async fn run_line_server(response: &'static [u8]) -> ServerContext {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let mut line = vec![];
        while !line.ends_with(b"\r\n") {
            let mut buf = [0u8; 256];
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => line.extend_from_slice(&buf[..n]),
            }
        }

        let _ = tx.send(line);

        for chunk in response.chunks(7) {
            stream.write_all(chunk).await.unwrap();
        }
        stream.shutdown().await.unwrap();
    });

    ServerContext { addr, request: rx }
}
