//! In-process mailbox [`Transport`] used to test multi-rank protocols
//! (halo exchange, migration) without an MPI runtime.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::{RecvResult, RecvToken, SendToken, Transport};
use crate::error::Result;

/// Shared network state for a group of [`LocalTransport`] "ranks" that
/// cooperate within a single test process. Every rank holds an `Rc` to the
/// same [`LocalNetwork`]; messages are deposited into per-destination
/// queues and picked up synchronously, since a single-threaded test never
/// actually races sender against receiver.
#[derive(Debug, Default)]
pub struct LocalNetwork {
    size: i32,
    // key: (dest, source, tag) -> queued payloads, oldest first.
    mailboxes: RefCell<std::collections::HashMap<(i32, i32, i32), VecDeque<Vec<f64>>>>,
}

impl LocalNetwork {
    /// Creates a network simulating `size` cooperating ranks.
    #[must_use]
    pub fn new(size: i32) -> Rc<Self> {
        Rc::new(Self {
            size,
            mailboxes: RefCell::default(),
        })
    }
}

/// One simulated rank's view of a [`LocalNetwork`].
#[derive(Clone, Debug)]
pub struct LocalTransport {
    rank: i32,
    net: Rc<LocalNetwork>,
}

impl LocalTransport {
    /// Creates the `rank`-th participant in `net`.
    #[must_use]
    pub fn new(rank: i32, net: &Rc<LocalNetwork>) -> Self {
        Self {
            rank,
            net: Rc::clone(net),
        }
    }
}

impl Transport for LocalTransport {
    fn self_rank(&self) -> i32 {
        self.rank
    }

    fn world_size(&self) -> i32 {
        self.net.size
    }

    fn isend(&mut self, dest: i32, tag: i32, data: &[f64]) -> SendToken {
        self.net
            .mailboxes
            .borrow_mut()
            .entry((dest, self.rank, tag))
            .or_default()
            .push_back(data.to_vec());
        SendToken { dest, tag }
    }

    fn irecv(&mut self, source: Option<i32>, tag: Option<i32>) -> RecvToken {
        RecvToken { source, tag }
    }

    fn wait_send(&mut self, _token: SendToken) -> Result<()> {
        // Delivery already happened synchronously in `isend`.
        Ok(())
    }

    fn wait_recv(&mut self, token: RecvToken) -> Result<RecvResult> {
        let mut mailboxes = self.net.mailboxes.borrow_mut();

        let key = match (token.source, token.tag) {
            (Some(source), Some(tag)) => {
                let key = (self.rank, source, tag);
                if mailboxes
                    .get(&key)
                    .is_none_or(std::collections::VecDeque::is_empty)
                {
                    return Err(crate::error::Error::Comm(format!(
                        "no message from rank {source} tag {tag} pending for rank {}",
                        self.rank
                    )));
                }
                key
            }
            _ => {
                // Any-source and/or any-tag: scan for the first non-empty
                // mailbox addressed to this rank that matches the filters.
                let found = mailboxes
                    .keys()
                    .filter(|&&(dest, source, tag)| {
                        dest == self.rank
                            && token.source.is_none_or(|s| s == source)
                            && token.tag.is_none_or(|t| t == tag)
                    })
                    .copied()
                    .find(|key| mailboxes.get(key).is_some_and(|q| !q.is_empty()));

                match found {
                    Some(key) => key,
                    None => {
                        return Err(crate::error::Error::Comm(format!(
                            "no matching message pending for rank {}",
                            self.rank
                        )));
                    }
                }
            }
        };

        let data = mailboxes.get_mut(&key).unwrap().pop_front().unwrap();
        let (_, source, tag) = key;
        Ok(RecvResult { source, tag, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_then_recv_round_trips_exact_payload() {
        let net = LocalNetwork::new(2);
        let mut a = LocalTransport::new(0, &net);
        let mut b = LocalTransport::new(1, &net);

        let token = a.isend(1, 42, &[1.0, 2.0, 3.0]);
        a.wait_send(token).unwrap();

        let rtoken = b.irecv(Some(0), Some(42));
        let result = b.wait_recv(rtoken).unwrap();
        assert_eq!(result.data, vec![1.0, 2.0, 3.0]);
        assert_eq!(result.source, 0);
        assert_eq!(result.tag, 42);
    }

    #[test]
    fn any_source_any_tag_receive_identifies_sender_via_tag() {
        let net = LocalNetwork::new(3);
        let mut a = LocalTransport::new(0, &net);
        let mut c = LocalTransport::new(2, &net);
        let mut b = LocalTransport::new(1, &net);

        a.isend(1, 7, &[9.0]);
        c.isend(1, 11, &[10.0]);

        let first = b.wait_recv(b.irecv(None, None)).unwrap();
        let second = b.wait_recv(b.irecv(None, None)).unwrap();

        let tags: Vec<_> = [&first, &second].iter().map(|r| r.tag).collect();
        assert!(tags.contains(&7));
        assert!(tags.contains(&11));
    }

    #[test]
    fn recv_without_pending_message_errors() {
        let net = LocalNetwork::new(2);
        let mut b = LocalTransport::new(1, &net);
        assert!(b.wait_recv(b.irecv(Some(0), Some(1))).is_err());
    }
}
