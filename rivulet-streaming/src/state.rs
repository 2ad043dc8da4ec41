//! Stream lifecycle states.

/// State of a stream.
///
/// `Created -> Open -> Draining -> Closed`, or `Failed` when the producer or the
/// transport gives up. `Closed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    /// Built, producer not started.
    #[default]
    Created,
    /// Producer started, nothing delivered yet.
    Open,
    /// At least one message delivered.
    Draining,
    /// End of stream reached.
    Closed,
    /// Ended by an error.
    Failed,
}

impl StreamState {
    /// Check if the state is final.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::created(StreamState::Created, false)]
    #[case::open(StreamState::Open, false)]
    #[case::draining(StreamState::Draining, false)]
    #[case::closed(StreamState::Closed, true)]
    #[case::failed(StreamState::Failed, true)]
    fn test_terminal_states(#[case] state: StreamState, #[case] terminal: bool) {
        assert_eq!(state.is_terminal(), terminal);
    }

    #[test]
    fn test_default_state() {
        assert_eq!(StreamState::default(), StreamState::Created);
    }
}
