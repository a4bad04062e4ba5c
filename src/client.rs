//! Interactive chat client
//!
//! Sends each input line (without its newline) as one message and prints
//! every chunk the server sends on its own line. The line `disconnect`
//! ends the session; so does the server closing the connection.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::RelayError;

/// Input line that ends the client
pub const DISCONNECT_COMMAND: &str = "disconnect";

/// Receive buffer size
const BUFFER_CAPACITY: usize = 4096;

/// Run the client over an established connection
pub async fn run_client<I, O>(stream: TcpStream, input: I, output: O) -> Result<(), RelayError>
where
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin + Send + 'static,
{
    let (reader, mut writer) = stream.into_split();
    let mut listen_task = tokio::spawn(print_received(reader, output));
    let mut lines = input.lines();

    info!("Connected to the server");
    info!("Type `{}` to disconnect from the server", DISCONNECT_COMMAND);

    loop {
        tokio::select! {
            _ = &mut listen_task => {
                info!("Server closed the connection");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line == DISCONNECT_COMMAND {
                    break;
                }
                if line.is_empty() {
                    continue;
                }
                writer.write_all(line.as_bytes()).await?;
            }
        }
    }

    let _ = writer.shutdown().await;
    listen_task.abort();
    info!("Closed socket");
    Ok(())
}

/// Listen task (socket -> output), one line per received chunk
async fn print_received<O>(mut reader: OwnedReadHalf, mut output: O)
where
    O: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; BUFFER_CAPACITY];
    loop {
        let received = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!("Receive failed: {}", e);
                break;
            }
        };

        let written = async {
            output.write_all(&buf[..received]).await?;
            output.write_all(b"\n").await?;
            output.flush().await
        };
        if written.await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::server::ChatServer;
    use std::time::Duration;
    use tokio::io::{duplex, BufReader, DuplexStream};
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    async fn expect<R: AsyncReadExt + Unpin>(reader: &mut R, expected: &[u8]) {
        let mut buf = vec![0u8; expected.len()];
        timeout(WAIT, reader.read_exact(&mut buf))
            .await
            .expect("timed out waiting for data")
            .unwrap();
        assert_eq!(
            String::from_utf8_lossy(&buf),
            String::from_utf8_lossy(expected)
        );
    }

    #[tokio::test]
    async fn test_client_chats_through_server() {
        let config = ServerConfig::default().with_bind_addr("127.0.0.1:0".parse().unwrap());
        let server = ChatServer::new(config).unwrap().bind().unwrap();

        let mut peer = TcpStream::connect(server.local_addr()).await.unwrap();
        expect(&mut peer, b"username: ").await;

        let stream = TcpStream::connect(server.local_addr()).await.unwrap();
        let (mut input, input_rx) = duplex(256);
        let (output_tx, mut output): (DuplexStream, DuplexStream) = duplex(1024);
        let client = tokio::spawn(run_client(stream, BufReader::new(input_rx), output_tx));

        expect(&mut output, b"username: \n").await;

        input.write_all(b"carol\n").await.unwrap();
        expect(&mut peer, b"`carol` joined the chat").await;

        peer.write_all(b"dan").await.unwrap();
        expect(&mut output, b"`dan` joined the chat\n").await;

        input.write_all(b"hello\n").await.unwrap();
        expect(&mut peer, b"carol: hello").await;

        input.write_all(b"disconnect\n").await.unwrap();
        timeout(WAIT, client)
            .await
            .expect("client did not exit")
            .unwrap()
            .unwrap();
        expect(&mut peer, b"`carol` left the chat").await;

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_client_exits_when_server_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let stream = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let (mut server_side, _) = listener.accept().await.unwrap();

        // Input stays open and silent
        let (_input, input_rx) = duplex(64);
        let (output_tx, mut output) = duplex(1024);
        let client = tokio::spawn(run_client(stream, BufReader::new(input_rx), output_tx));

        server_side.write_all(b"username: ").await.unwrap();
        expect(&mut output, b"username: \n").await;
        drop(server_side);

        timeout(WAIT, client)
            .await
            .expect("client did not exit")
            .unwrap()
            .unwrap();
    }
}
