//! Stream transport: a listener that dispatches each
//! accepted connection to its own thread, and an outbound connector that
//! spawns a receive thread symmetrically.

use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Handle to a running accept loop. Dropping it does not stop the loop —
/// call `shutdown()` explicitly, matching the process-wide cancellation
/// model (stop signal checked at the next suspension point).
pub struct ListenerHandle {
    stop: Arc<AtomicBool>,
    local_addr: SocketAddr,
    join: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signals the accept loop to stop and unblocks it with a dummy
    /// self-connect, since `TcpListener::accept` has no other portable way
    /// to be interrupted.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = TcpStream::connect(self.local_addr);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Binds `addr` and begins accepting. Each accepted connection is
/// dispatched to an independent thread running `handler(conn, remote_addr)`.
pub fn listen<H>(addr: SocketAddr, handler: H) -> std::io::Result<ListenerHandle>
where
    H: Fn(TcpStream, SocketAddr) + Send + Sync + 'static,
{
    let listener = TcpListener::bind(addr)?;
    let local_addr = listener.local_addr()?;
    let stop = Arc::new(AtomicBool::new(false));
    let stop_for_loop = stop.clone();
    let handler = Arc::new(handler);

    let join = thread::spawn(move || {
        for incoming in listener.incoming() {
            if stop_for_loop.load(Ordering::SeqCst) {
                break;
            }
            match incoming {
                Ok(stream) => {
                    let remote = match stream.peer_addr() {
                        Ok(a) => a,
                        Err(_) => continue,
                    };
                    let handler = handler.clone();
                    thread::spawn(move || handler(stream, remote));
                }
                Err(_) => break,
            }
        }
        tracing::debug!(%local_addr, "accept loop stopped");
    });

    Ok(ListenerHandle {
        stop,
        local_addr,
        join: Some(join),
    })
}

/// Establishes an outbound connection to `addr` and spawns `handler` on a
/// dedicated thread to run the receive loop. Returns the stream so the
/// caller can also send on it.
pub fn connect<H>(addr: SocketAddr, handler: H) -> std::io::Result<TcpStream>
where
    H: FnOnce(TcpStream) + Send + 'static,
{
    let stream = TcpStream::connect(addr)?;
    let recv_side = stream.try_clone()?;
    thread::spawn(move || handler(recv_side));
    Ok(stream)
}

/// Writes `bytes` to a shared `&TcpStream` by cloning the file descriptor,
/// since `Write::write_all` needs `&mut self` and callers here only hold a
/// shared reference (e.g. while replying from inside `process_envelope`).
pub fn write_all(stream: &TcpStream, bytes: &[u8]) -> std::io::Result<()> {
    let mut owned = stream.try_clone()?;
    owned.write_all(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::mpsc;

    #[test]
    fn accept_dispatches_to_handler_thread() {
        let (tx, rx) = mpsc::channel();
        let listener = listen("127.0.0.1:0".parse().unwrap(), move |mut stream, _addr| {
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).unwrap();
            tx.send(buf).unwrap();
        })
        .unwrap();

        let mut client = TcpStream::connect(listener.local_addr()).unwrap();
        client.write_all(b"hello").unwrap();

        let received = rx.recv_timeout(std::time::Duration::from_secs(2)).unwrap();
        assert_eq!(&received, b"hello");
        listener.shutdown();
    }
}
