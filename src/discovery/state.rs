//! Registration state machine.

use tokio::sync::watch;

use crate::error::{DiscoveryErrorKind, RelayError};

/// Lifecycle of this process's registration with the registry.
///
/// Ordered: a state only ever advances to its immediate successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegistrationState {
    Unregistered,
    Registering,
    WaitingForCredentials,
    Ready,
}

impl RegistrationState {
    /// The only state this one may advance to.
    pub fn successor(self) -> Option<Self> {
        match self {
            RegistrationState::Unregistered => Some(RegistrationState::Registering),
            RegistrationState::Registering => Some(RegistrationState::WaitingForCredentials),
            RegistrationState::WaitingForCredentials => Some(RegistrationState::Ready),
            RegistrationState::Ready => None,
        }
    }
}

/// Single-writer holder of the current [`RegistrationState`].
#[derive(Debug)]
pub struct StateMachine {
    tx: watch::Sender<RegistrationState>,
}

impl StateMachine {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RegistrationState::Unregistered);
        Self { tx }
    }

    pub fn current(&self) -> RegistrationState {
        *self.tx.borrow()
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<RegistrationState> {
        self.tx.subscribe()
    }

    /// Move to `next`.
    ///
    /// Re-entering the current state is a no-op; anything other than the
    /// immediate successor is rejected and leaves the state untouched.
    pub fn advance(&self, next: RegistrationState) -> Result<(), RelayError> {
        let mut result = Ok(());
        self.tx.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            if state.successor() == Some(next) {
                *state = next;
                true
            } else {
                result = Err(RelayError::discovery(DiscoveryErrorKind::InvalidTransition {
                    from: *state,
                    to: next,
                }));
                false
            }
        });
        result
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RegistrationState::*;

    #[test]
    fn test_advances_in_order() {
        let machine = StateMachine::new();
        assert_eq!(machine.current(), Unregistered);

        for next in [Registering, WaitingForCredentials, Ready] {
            machine.advance(next).unwrap();
            assert_eq!(machine.current(), next);
        }
    }

    #[test]
    fn test_rejects_skips_and_regressions() {
        let machine = StateMachine::new();
        assert!(machine.advance(Ready).is_err());
        assert_eq!(machine.current(), Unregistered);

        machine.advance(Registering).unwrap();
        machine.advance(WaitingForCredentials).unwrap();
        assert!(matches!(
            machine.advance(Registering),
            Err(RelayError::Discovery {
                kind: DiscoveryErrorKind::InvalidTransition {
                    from: WaitingForCredentials,
                    to: Registering
                }
            })
        ));
        assert_eq!(machine.current(), WaitingForCredentials);
    }

    #[test]
    fn test_same_state_is_noop() {
        let machine = StateMachine::new();
        machine.advance(Registering).unwrap();
        machine.advance(Registering).unwrap();
        assert_eq!(machine.current(), Registering);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let machine = StateMachine::new();
        let mut rx = machine.subscribe();

        machine.advance(Registering).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Registering);
    }
}
