//! WebSocket adapter turning an upgraded socket into the hub's frame halves

use crate::connection::{FrameSink, FrameStream};
use crate::error::{ChatError, Result};
use futures::future::ready;
use futures::{SinkExt, StreamExt};
use log::debug;
use shared::CodecError;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;

/// Performs the server side of the upgrade, refusing any other path with 404
pub async fn accept<S>(stream: S, path: &str) -> Result<WebSocketStream<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let expected = path.to_string();
    let check_path = move |request: &Request, response: Response| {
        if request.uri().path() == expected {
            Ok(response)
        } else {
            debug!("Refusing upgrade for path {}", request.uri().path());
            let mut refusal = ErrorResponse::new(Some("not found".to_string()));
            *refusal.status_mut() = StatusCode::NOT_FOUND;
            Err(refusal)
        }
    };

    Ok(tokio_tungstenite::accept_hdr_async(stream, check_path).await?)
}

/// Splits a WebSocket into text-frame halves
///
/// Text and binary frames are both passed on as UTF-8 text. Ping and pong
/// frames are skipped, and a close frame ends the stream.
pub fn split<S>(socket: WebSocketStream<S>) -> (FrameSink, FrameStream)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (write, read) = socket.split();

    let sink: FrameSink = Box::pin(
        write
            .sink_map_err(ChatError::from)
            .with(|frame: String| ready(Ok::<_, ChatError>(Message::text(frame)))),
    );

    let stream: FrameStream = Box::pin(
        read.take_while(|item| ready(!matches!(item, Ok(Message::Close(_)))))
            .filter_map(|item| ready(into_frame(item))),
    );

    (sink, stream)
}

fn into_frame(item: std::result::Result<Message, tungstenite::Error>) -> Option<Result<String>> {
    match item {
        Ok(message @ (Message::Text(_) | Message::Binary(_))) => Some(
            message
                .to_text()
                .map(str::to_owned)
                .map_err(|_| ChatError::Decode(CodecError::NotUtf8)),
        ),
        Ok(_) => None,
        Err(e) => Some(Err(ChatError::WebSocket(e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_frame_passes_through() {
        let frame = into_frame(Ok(Message::text(r#"{"username":"a","message":"b"}"#)));
        assert_eq!(
            frame.unwrap().unwrap(),
            r#"{"username":"a","message":"b"}"#
        );
    }

    #[test]
    fn test_binary_frame_is_read_as_text() {
        let frame = into_frame(Ok(Message::binary(b"{}".to_vec())));
        assert_eq!(frame.unwrap().unwrap(), "{}");
    }

    #[test]
    fn test_invalid_utf8_binary_is_decode_error() {
        let frame = into_frame(Ok(Message::binary(vec![0xff, 0xfe])));
        assert!(matches!(
            frame,
            Some(Err(ChatError::Decode(CodecError::NotUtf8)))
        ));
    }

    #[test]
    fn test_control_frames_are_skipped() {
        assert!(into_frame(Ok(Message::Ping(Default::default()))).is_none());
        assert!(into_frame(Ok(Message::Pong(Default::default()))).is_none());
    }

    #[test]
    fn test_transport_error_is_reported() {
        let frame = into_frame(Err(tungstenite::Error::ConnectionClosed));
        assert!(matches!(frame, Some(Err(ChatError::WebSocket(_)))));
    }
}
