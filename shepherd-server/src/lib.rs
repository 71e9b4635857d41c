use futures::stream::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;

pub mod receiver;

/// One datagram in flight, either direction. DNS over UDP without
/// EDNS(0) never exceeds 512 bytes, so the payload is a fixed array
/// with `size` marking the meaningful prefix.
pub struct Message {
    pub address: SocketAddr,
    pub buffer: [u8; 512],
    pub size: usize,
}

/// Turns one received datagram into at most one reply. Returning `None`
/// drops the datagram silently, which is the required behaviour for
/// malformed queries.
#[async_trait::async_trait]
pub trait Handler {
    async fn handle(&self, message: Message) -> Option<Message>;
}

pub struct UdpServer<H> {
    address: SocketAddr,
    handler: H,
}

impl<H: Handler> UdpServer<H> {
    pub fn new(address: SocketAddr, handler: H) -> Self {
        Self { address, handler }
    }

    pub async fn run(&self) -> std::io::Result<()> {
        let socket = UdpSocket::bind(self.address).await?;
        tracing::info!("listening on {:?}", socket.local_addr()?);
        let socket = Arc::new(socket);

        let receiver = receiver::Receiver::new(socket.clone());

        let stream = receiver
            .into_stream()
            .map(|item| async { self.handler.handle(item).await })
            .buffer_unordered(64);

        tokio::pin!(stream);

        while let Some(item) = stream.next().await {
            let Some(reply) = item else {
                continue;
            };
            tracing::debug!("replying {} bytes to {:?}", reply.size, reply.address);
            if let Err(error) = socket
                .send_to(&reply.buffer[0..reply.size], reply.address)
                .await
            {
                tracing::error!("couldn't send reply to {:?}: {error:?}", reply.address);
            }
        }

        Ok(())
    }
}
