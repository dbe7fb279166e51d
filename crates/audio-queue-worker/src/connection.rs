use crate::WorkerError;
use audio_queue_protocol::{Message, MessageCodec};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;

pub(crate) async fn connect(address: &str) -> Result<Framed<TcpStream, MessageCodec>, WorkerError> {
    let stream = TcpStream::connect(address)
        .await
        .map_err(|source| WorkerError::Connect {
            url: address.to_string(),
            source,
        })?;
    Ok(Framed::new(stream, MessageCodec))
}

/// Single request/reply exchange on a fresh connection, bounded by `limit`.
///
/// `Nack` replies are surfaced as `WorkerError::Rejected`.
pub(crate) async fn request(
    address: &str,
    message: Message,
    limit: Duration,
) -> Result<Message, WorkerError> {
    let exchange = async {
        let mut framed = connect(address).await?;
        framed.send(message).await?;

        match framed.next().await {
            Some(Ok(Message::Nack(nack))) => Err(WorkerError::Rejected(nack.error)),
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(WorkerError::from(e)),
            None => Err(WorkerError::ConnectionClosed),
        }
    };

    match timeout(limit, exchange).await {
        Ok(result) => result,
        Err(_) => Err(WorkerError::Timeout(limit)),
    }
}
