use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use log::debug;

/// Link state of a [`Printer`](crate::Printer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Printing,
}

/// Current state plus the subscribers told about every transition.
///
/// Subscribers receive a `Stream` of states. A dropped receiver is pruned on
/// the next transition.
#[derive(Debug, Default)]
pub struct StatusMonitor {
    state: ConnectionState,
    subscribers: Vec<UnboundedSender<ConnectionState>>,
}

impl StatusMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Registers a new observer. Only transitions after this call are delivered.
    pub fn subscribe(&mut self) -> UnboundedReceiver<ConnectionState> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Moves to `next` and notifies every live subscriber.
    pub fn set(&mut self, next: ConnectionState) {
        debug!("printer state {:?} -> {:?}", self.state, next);
        self.state = next;
        self.subscribers
            .retain(|tx| tx.unbounded_send(next).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut UnboundedReceiver<ConnectionState>) -> Vec<ConnectionState> {
        let mut out = Vec::new();
        while let Ok(Some(s)) = rx.try_next() {
            out.push(s);
        }
        out
    }

    #[test]
    fn starts_disconnected() {
        assert_eq!(StatusMonitor::new().state(), ConnectionState::Disconnected);
    }

    #[test]
    fn every_subscriber_sees_every_transition() {
        let mut m = StatusMonitor::new();
        let mut a = m.subscribe();
        m.set(ConnectionState::Connecting);
        let mut b = m.subscribe();
        m.set(ConnectionState::Connected);

        assert_eq!(
            drain(&mut a),
            vec![ConnectionState::Connecting, ConnectionState::Connected]
        );
        assert_eq!(drain(&mut b), vec![ConnectionState::Connected]);
        assert_eq!(m.state(), ConnectionState::Connected);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut m = StatusMonitor::new();
        let keep = m.subscribe();
        drop(m.subscribe());
        assert_eq!(m.subscriber_count(), 2);
        m.set(ConnectionState::Connecting);
        assert_eq!(m.subscriber_count(), 1);
        drop(keep);
    }
}
