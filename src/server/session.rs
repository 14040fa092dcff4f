//! Per-connection TCP handling over [`line`]: one tokio task per
//! accepted socket, a mutex-guarded live-session counter enforcing
//! `maxConn` (§5 "global mutable state: a monotonic counter of live
//! sessions"), grounded in `SocketServer::acceptConnection` plus the
//! `StreamAppender`/`StreamGetter` thread pattern the original's
//! `ServerBase.cxx` uses for one worker per socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;

use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio::net::TcpStream;

use crate::server::bases::BaseTable;
use crate::server::line;
use crate::server::line::Outcome;

/// bounds the number of sessions served concurrently; additional
/// connections are accepted, told so, and closed (§6 "Maximum
/// connections exceeded").
struct SessionLimit {
    live: Mutex<usize>,
    max: usize,
}

impl SessionLimit {
    fn new(max: usize) -> Self {
        Self { live: Mutex::new(0), max }
    }

    fn try_acquire(&self) -> bool {
        let mut live = self.live.lock().expect("session counter poisoned");
        if *live >= self.max {
            false
        } else {
            *live += 1;
            true
        }
    }

    fn release(&self) {
        let mut live = self.live.lock().expect("session counter poisoned");
        *live = live.saturating_sub(1);
    }
}

/// runs the accept loop until the listener itself fails repeatedly.
/// Each connection gets its own task and its own session-local
/// [`crate::options::Options`], seeded from the selected base's
/// `default_options`.
pub async fn run(addr: SocketAddr, bases: Arc<BaseTable>, maxconn: usize) -> crate::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    let limit = Arc::new(SessionLimit::new(maxconn));
    log::info!("listening on {addr}, maxconn={maxconn}");

    let mut consecutive_failures = 0u32;
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                consecutive_failures = 0;
                let bases = bases.clone();
                let limit = limit.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, peer, bases, limit).await {
                        log::warn!("session with {peer} ended with error: {e}");
                    }
                });
            }
            Err(e) => {
                consecutive_failures += 1;
                log::warn!("accept failed: {e}");
                if consecutive_failures >= 20 {
                    return Err(crate::MemlearnError::Io(e));
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    bases: Arc<BaseTable>,
    limit: Arc<SessionLimit>,
) -> crate::Result<()> {
    let (read_half, mut write_half) = stream.into_split();

    if !limit.try_acquire() {
        write_half
            .write_all(b"ERROR { Maximum connections exceeded }\n")
            .await?;
        return Ok(());
    }
    let _guard = ReleaseOnDrop(limit);

    let mut current = bases.default_base()?;
    let mut options = current.default_options.session_clone();

    let mut greeting = format!("{}\n", line::GREETING);
    if bases.is_multi() {
        greeting.push_str(&format!("available bases: {}\n", bases.names().collect::<Vec<_>>().join(" ")));
    }
    write_half.write_all(greeting.as_bytes()).await?;

    let mut lines = BufReader::new(read_half).lines();
    log::debug!("session opened from {peer}");
    while let Some(raw) = lines.next_line().await? {
        let trimmed = raw.trim_end_matches('\r');
        match line::process_line(trimmed, &bases, &mut current, &mut options) {
            Outcome::Reply(reply) => {
                write_half.write_all(reply.as_bytes()).await?;
            }
            Outcome::Exit(reply) => {
                write_half.write_all(reply.as_bytes()).await?;
                break;
            }
        }
    }
    log::debug!("session with {peer} closed");
    Ok(())
}

struct ReleaseOnDrop(Arc<SessionLimit>);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_rejects_past_capacity_and_recovers_after_release() {
        let limit = SessionLimit::new(2);
        assert!(limit.try_acquire());
        assert!(limit.try_acquire());
        assert!(!limit.try_acquire());
        limit.release();
        assert!(limit.try_acquire());
    }
}
