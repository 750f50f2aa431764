//! Session State
//!
//! A session that has not been opened has no value at all; once the control
//! connection exists it moves between the states below.

use crate::message::Method;
use std::fmt;

/// Control-plane state of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Control connection open, no stream set up
    Init,
    /// Stream set up (or paused), data socket open
    Ready,
    /// Stream playing, receive loop running
    Playing,
    /// Connection closed; terminal
    Closed,
}

impl ConnectionState {
    /// Whether `method` may be issued from this state
    pub fn allows(self, method: Method) -> bool {
        match method {
            Method::Setup => self == ConnectionState::Init,
            Method::Play => self == ConnectionState::Ready,
            Method::Pause => self == ConnectionState::Playing,
            Method::Teardown => {
                matches!(self, ConnectionState::Ready | ConnectionState::Playing)
            }
        }
    }

    /// State reached after a successful `method`
    pub fn after(method: Method) -> Self {
        match method {
            Method::Setup | Method::Pause => ConnectionState::Ready,
            Method::Play => ConnectionState::Playing,
            Method::Teardown => ConnectionState::Init,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Init => "INIT",
            ConnectionState::Ready => "READY",
            ConnectionState::Playing => "PLAYING",
            ConnectionState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [ConnectionState; 4] = [
        ConnectionState::Init,
        ConnectionState::Ready,
        ConnectionState::Playing,
        ConnectionState::Closed,
    ];

    #[test]
    fn test_allowed_transitions() {
        let allowed: Vec<(ConnectionState, Method)> = ALL_STATES
            .iter()
            .flat_map(|&state| {
                [Method::Setup, Method::Play, Method::Pause, Method::Teardown]
                    .into_iter()
                    .filter(move |&m| state.allows(m))
                    .map(move |m| (state, m))
            })
            .collect();

        assert_eq!(
            allowed,
            vec![
                (ConnectionState::Init, Method::Setup),
                (ConnectionState::Ready, Method::Play),
                (ConnectionState::Ready, Method::Teardown),
                (ConnectionState::Playing, Method::Pause),
                (ConnectionState::Playing, Method::Teardown),
            ]
        );
    }

    #[test]
    fn test_closed_allows_nothing() {
        for method in [Method::Setup, Method::Play, Method::Pause, Method::Teardown] {
            assert!(!ConnectionState::Closed.allows(method));
        }
    }

    #[test]
    fn test_after() {
        assert_eq!(ConnectionState::after(Method::Setup), ConnectionState::Ready);
        assert_eq!(ConnectionState::after(Method::Play), ConnectionState::Playing);
        assert_eq!(ConnectionState::after(Method::Pause), ConnectionState::Ready);
        assert_eq!(ConnectionState::after(Method::Teardown), ConnectionState::Init);
    }
}
