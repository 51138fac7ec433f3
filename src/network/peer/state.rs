use std::fmt;

/// Lifecycle state of a single relayed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, ban check not yet passed
    Unadmitted,

    /// Registered, read loop not started
    Admitted,

    /// Reading and relaying payloads
    Active,

    /// Deregistered and closed
    Terminated,
}

impl ConnectionState {
    /// Check whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Unadmitted, Admitted)
                | (Unadmitted, Terminated)
                | (Admitted, Active)
                | (Admitted, Terminated)
                | (Active, Terminated)
        )
    }

    /// Check if the state is final
    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Terminated
    }
}

/// Why the relay closed a connection on its own initiative
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Operator kick
    Kicked,

    /// Operator ban while connected
    Banned,

    /// A newer connection from the same address took its place
    Replaced,

    /// Outbound queue filled up; the peer is not reading fast enough
    Overflow,
}

/// Why a connection was refused at admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefusalReason {
    /// Address is in the ban set
    Banned,

    /// Address is already registered and duplicates are rejected
    Duplicate,
}

/// How a connection's lifecycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// Never admitted
    Refused(RefusalReason),

    /// Peer closed its side of the stream
    PeerClosed,

    /// Reading from the peer failed
    ReadFailed(String),

    /// Writing to the peer failed
    WriteFailed(String),

    /// Closed by the relay
    Closed(CloseReason),
}

impl TerminationReason {
    /// Check if the connection was ever admitted
    pub fn was_admitted(&self) -> bool {
        !matches!(self, TerminationReason::Refused(_))
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Refused(RefusalReason::Banned) => write!(f, "refused: banned"),
            TerminationReason::Refused(RefusalReason::Duplicate) => write!(f, "refused: duplicate address"),
            TerminationReason::PeerClosed => write!(f, "peer closed the connection"),
            TerminationReason::ReadFailed(e) => write!(f, "read failed: {}", e),
            TerminationReason::WriteFailed(e) => write!(f, "write failed: {}", e),
            TerminationReason::Closed(CloseReason::Kicked) => write!(f, "kicked"),
            TerminationReason::Closed(CloseReason::Banned) => write!(f, "banned"),
            TerminationReason::Closed(CloseReason::Replaced) => write!(f, "replaced by a newer connection"),
            TerminationReason::Closed(CloseReason::Overflow) => write!(f, "outbound queue overflowed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        use ConnectionState::*;

        assert!(Unadmitted.can_transition_to(Admitted));
        assert!(Unadmitted.can_transition_to(Terminated));
        assert!(Admitted.can_transition_to(Active));
        assert!(Active.can_transition_to(Terminated));

        assert!(!Unadmitted.can_transition_to(Active));
        assert!(!Active.can_transition_to(Admitted));
        assert!(!Terminated.can_transition_to(Active));
        assert!(!Terminated.can_transition_to(Terminated));
        assert!(Terminated.is_terminal());
    }

    #[test]
    fn test_refusals_were_never_admitted() {
        assert!(!TerminationReason::Refused(RefusalReason::Banned).was_admitted());
        assert!(TerminationReason::Closed(CloseReason::Kicked).was_admitted());
        assert_eq!(TerminationReason::PeerClosed.to_string(), "peer closed the connection");
    }
}
