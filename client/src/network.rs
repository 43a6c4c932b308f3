use crate::input::{render, InputManager};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{info, warn};
use shared::ChatMessage;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type ClientResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct Client {
    write: SplitSink<Socket, Message>,
    read: SplitStream<Socket>,
    input: InputManager,
}

impl Client {
    /// Opens a WebSocket connection to the chat endpoint
    pub async fn connect(url: &str, username: impl Into<String>) -> ClientResult<Self> {
        info!("Connecting to {}...", url);
        let (socket, _response) = connect_async(url).await?;
        let (write, read) = socket.split();

        Ok(Client {
            write,
            read,
            input: InputManager::new(username),
        })
    }

    pub fn username(&self) -> &str {
        self.input.username()
    }

    pub async fn send_message(&mut self, message: &ChatMessage) -> ClientResult<()> {
        let frame = shared::encode(message)?;
        self.write.send(Message::text(frame)).await?;
        Ok(())
    }

    /// Sends one typed line; blank lines are skipped
    pub async fn send_line(&mut self, line: &str) -> ClientResult<bool> {
        match self.input.compose(line) {
            Some(message) => {
                self.send_message(&message).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Waits for the next broadcast message
    ///
    /// Returns `None` once the server closes the connection. Frames that do
    /// not decode are logged and skipped.
    pub async fn next_message(&mut self) -> Option<ClientResult<ChatMessage>> {
        while let Some(frame) = self.read.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => return Some(Err(e.into())),
            };

            match frame {
                Message::Text(_) | Message::Binary(_) => {
                    let decoded = frame
                        .to_text()
                        .map_err(|e| e.to_string())
                        .and_then(|text| shared::decode(text).map_err(|e| e.to_string()));
                    match decoded {
                        Ok(message) => return Some(Ok(message)),
                        Err(e) => warn!("Ignoring undecodable frame: {}", e),
                    }
                }
                Message::Close(_) => return None,
                _ => {}
            }
        }
        None
    }

    pub async fn close(&mut self) {
        if let Err(e) = self.write.close().await {
            warn!("Error closing connection: {}", e);
        }
    }

    /// Interactive loop: stdin lines go out, broadcasts are printed
    pub async fn run(&mut self) -> ClientResult<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        info!("Connected as {}. Type a message and press Enter.", self.username());

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line? {
                        Some(line) => {
                            self.send_line(&line).await?;
                        }
                        None => {
                            info!("Input closed, leaving chat");
                            break;
                        }
                    }
                },

                incoming = self.next_message() => {
                    match incoming {
                        Some(Ok(message)) => println!("{}", render(&message)),
                        Some(Err(e)) => {
                            warn!("Connection error: {}", e);
                            break;
                        }
                        None => {
                            info!("Server closed the connection");
                            break;
                        }
                    }
                },
            }
        }

        self.close().await;
        Ok(())
    }
}
