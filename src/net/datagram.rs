//! Datagram transport used only by the
//! directory registry and its client, request/response over UDP with each
//! message fitting in a single datagram.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use socket2::{Domain, Socket, Type};

/// Maximum practical datagram size for directory requests/responses
/// for directory requests/responses.
pub const MAX_DATAGRAM_BYTES: usize = 1400;

fn bind_reusable(addr: SocketAddr) -> std::io::Result<UdpSocket> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::DGRAM, None)?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    Ok(socket.into())
}

/// Handle to a running request-handling loop (the directory server side).
pub struct DatagramServerHandle {
    stop: Arc<AtomicBool>,
    local_addr: SocketAddr,
    join: Option<JoinHandle<()>>,
}

impl DatagramServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // Unblock the blocking recv_from with a harmless self-datagram.
        if let Ok(waker) = UdpSocket::bind("0.0.0.0:0") {
            let _ = waker.send_to(&[], self.local_addr);
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Binds `addr` and dispatches each inbound datagram to `handler`, which
/// returns the response bytes to send back to the sender. Runs on its own
/// thread; request handling itself is synchronous (one datagram at a time),
/// matching the directory's single-lock-protected registry.
pub fn serve<H>(addr: SocketAddr, handler: H) -> std::io::Result<DatagramServerHandle>
where
    H: Fn(&[u8], SocketAddr) -> Option<Vec<u8>> + Send + Sync + 'static,
{
    let socket = bind_reusable(addr)?;
    let local_addr = socket.local_addr()?;
    let stop = Arc::new(AtomicBool::new(false));
    let stop_for_loop = stop.clone();

    let join = thread::spawn(move || {
        let mut buf = [0u8; MAX_DATAGRAM_BYTES];
        loop {
            if stop_for_loop.load(Ordering::SeqCst) {
                break;
            }
            match socket.recv_from(&mut buf) {
                Ok((len, from)) => {
                    if stop_for_loop.load(Ordering::SeqCst) {
                        break;
                    }
                    if let Some(response) = handler(&buf[..len], from) {
                        if let Err(e) = socket.send_to(&response, from) {
                            tracing::warn!(%from, error = %e, "failed to send directory response");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "datagram recv_from failed");
                }
            }
        }
        tracing::debug!(%local_addr, "datagram server loop stopped");
    });

    Ok(DatagramServerHandle {
        stop,
        local_addr,
        join: Some(join),
    })
}

/// Sends `request` to `server_addr` and blocks for a response, up to
/// `timeout`. Used by the synchronous directory client.
pub fn request(
    server_addr: SocketAddr,
    request: &[u8],
    timeout: Duration,
) -> std::io::Result<Vec<u8>> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.set_read_timeout(Some(timeout))?;
    socket.send_to(request, server_addr)?;
    let mut buf = [0u8; MAX_DATAGRAM_BYTES];
    let (len, _) = socket.recv_from(&mut buf)?;
    Ok(buf[..len].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_and_request_roundtrip() {
        let handle = serve("127.0.0.1:0".parse().unwrap(), |req, _from| {
            let mut resp = b"echo:".to_vec();
            resp.extend_from_slice(req);
            Some(resp)
        })
        .unwrap();

        let resp = request(handle.local_addr(), b"ping", Duration::from_secs(2)).unwrap();
        assert_eq!(resp, b"echo:ping");
        handle.shutdown();
    }

    #[test]
    fn request_times_out_with_no_server() {
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let result = request(addr, b"x", Duration::from_millis(200));
        assert!(result.is_err());
    }
}
