use std::sync::Arc;

use service::{Handler, Router, SecretProvider};
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// udp socket process loop.
///
/// read datagrams from the UDP socket, hand them to the pipeline, and
/// send the response datagram back to the peer.
async fn process_socket<S, H>(router: Arc<Router<S, H>>, socket: Arc<UdpSocket>)
where
    S: SecretProvider,
    H: Handler,
{
    let mut buf = vec![0u8; 4096];

    loop {
        let (size, addr) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                log::warn!("udp socket receive error: {:?}", e);
                continue;
            }
        };

        log::trace!("udp socket receive: size={}, addr={:?}", size, addr);

        // Anything shorter than a packet header is noise.
        if size < 20 {
            continue;
        }

        if let Some((reply, target)) = router.route(&buf[..size], addr).await {
            if let Err(e) = socket.send_to(&reply, target).await {
                log::warn!("udp socket send error: {:?}", e);
            } else {
                log::trace!("udp socket reply: size={}, addr={:?}", reply.len(), target);
            }
        }
    }
}

/// start a udp server socket.
///
/// bind the listen address and run a number of receive loops over the
/// shared socket, each feeding the pipeline independently. returns the
/// bound address, which matters when the configuration asked for port
/// zero.
pub async fn run<S, H>(
    listen: SocketAddr,
    threads: usize,
    router: Arc<Router<S, H>>,
) -> anyhow::Result<SocketAddr>
where
    S: SecretProvider,
    H: Handler,
{
    let socket = Arc::new(UdpSocket::bind(listen).await?);
    let local_addr = socket.local_addr()?;

    for _ in 0..threads.max(1) {
        tokio::spawn(process_socket(router.clone(), socket.clone()));
    }

    log::info!("radius server workers number: {}", threads.max(1));
    log::info!("radius server listening: {}", local_addr);
    Ok(local_addr)
}
