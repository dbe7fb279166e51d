use audio_queue_protocol::{Message, MessageCodec};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::codec::Framed;

/// Serves the task-queue protocol on an ephemeral port, replying to each
/// frame with whatever `respond` returns.
pub(crate) async fn spawn_responder<F>(respond: F) -> SocketAddr
where
    F: Fn(Message) -> Option<Message> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let respond = respond.clone();
            tokio::spawn(async move {
                let mut framed = Framed::new(stream, MessageCodec);
                while let Some(Ok(message)) = framed.next().await {
                    if let Some(reply) = respond(message) {
                        if framed.send(reply).await.is_err() {
                            break;
                        }
                    }
                }
            });
        }
    });

    addr
}

/// Connection string for a port nothing listens on
pub(crate) async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("tcp://{}", addr)
}
