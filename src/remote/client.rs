use super::Request;
use super::Response;
use crate::HELPER_TIMEOUT_MS;
use crate::console::Input;
use crate::console::Savestate;
use std::net::SocketAddr;
use std::net::TcpStream;
use std::time::Duration;

/// the master's view of helper processes. helpers are a throughput
/// optimization only: any one of them failing, stalling, or answering
/// garbage just means the affected candidates get evaluated locally,
/// so correctness never depends on this module.
#[derive(Debug, Clone, Default)]
pub struct Helpers {
    peers: Vec<SocketAddr>,
}

impl Helpers {
    fn timeout() -> Duration {
        Duration::from_millis(HELPER_TIMEOUT_MS)
    }

    /// run without helpers
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// probe a configured port range and keep whoever answers
    pub fn probe(host: &str, ports: &[u16]) -> Self {
        let peers = ports
            .iter()
            .filter_map(|port| format!("{}:{}", host, port).parse::<SocketAddr>().ok())
            .filter(|addr| match TcpStream::connect_timeout(addr, Self::timeout()) {
                Ok(_) => {
                    log::info!("helper answering at {}", addr);
                    true
                }
                Err(_) => false,
            })
            .collect::<Vec<_>>();
        if peers.is_empty() && !ports.is_empty() {
            log::warn!("no helpers answered; evaluating locally");
        }
        Self { peers }
    }

    /// farm the round's candidates out across the peers, one request
    /// per candidate. every slot that fails for any reason comes back
    /// None and the caller re-executes it locally.
    pub fn dispatch(
        &self,
        state: &Savestate,
        nexts: &[Vec<Input>],
        futures: &[Vec<Input>],
    ) -> Vec<Option<Response>> {
        if self.peers.is_empty() {
            return nexts.iter().map(|_| None).collect();
        }
        nexts
            .iter()
            .enumerate()
            .map(|(i, next)| {
                let peer = self.peers[i % self.peers.len()];
                let request = Request {
                    state: state.clone(),
                    next: next.clone(),
                    futures: futures.to_vec(),
                };
                match self.exchange(peer, &request) {
                    Ok(response) if response.per_future.len() == futures.len() => Some(response),
                    Ok(response) => {
                        log::warn!(
                            "helper {} answered {} of {} futures; discarding",
                            peer,
                            response.per_future.len(),
                            futures.len()
                        );
                        None
                    }
                    Err(e) => {
                        log::warn!("helper {} failed ({}); evaluating locally", peer, e);
                        None
                    }
                }
            })
            .collect()
    }

    fn exchange(&self, peer: SocketAddr, request: &Request) -> anyhow::Result<Response> {
        let mut stream = TcpStream::connect_timeout(&peer, Self::timeout())?;
        stream.set_read_timeout(Some(Self::timeout()))?;
        stream.set_write_timeout(Some(Self::timeout()))?;
        request.write(&mut stream)?;
        Response::read(&mut stream)
    }
}
