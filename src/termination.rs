//! Termination behavior: when is a logical stream fully closed?
//!
//! Each interaction model maps terminating events (`cancel`, `error`,
//! `complete`) sent by either side to a "fully terminated" decision.
//! Request-response and request-stream need no intermediate state; a
//! channel terminates only once both sides have completed, so it tracks
//! which side finished first.

use crate::frame::{Frame, FrameBody};

/// A terminating event extracted from a frame or a local operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationEvent {
    Cancel,
    Error,
    Complete,
}

/// Which side of the stream produced a terminating event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Requester,
    Responder,
}

/// Channel termination state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    Active,
    RequesterTerminated,
    ResponderTerminated,
    Terminated,
}

/// Per-stream termination state machine, one variant per interaction model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationBehavior {
    RequestResponse,
    RequestStream,
    Channel(ChannelStateHolder),
}

/// Wrapper keeping [`ChannelState`] private while the enum stays `Copy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStateHolder(ChannelState);

impl TerminationBehavior {
    /// Behavior for a request-response stream.
    pub fn request_response() -> Self {
        Self::RequestResponse
    }

    /// Behavior for a request-stream stream.
    pub fn request_stream() -> Self {
        Self::RequestStream
    }

    /// Behavior for a request-channel stream.
    pub fn channel() -> Self {
        Self::Channel(ChannelStateHolder(ChannelState::Active))
    }

    /// Apply a terminating event; returns whether the stream is now fully
    /// terminated (and may be deregistered by the caller).
    ///
    /// For channels the decision is sticky: once terminated, every later
    /// event keeps reporting terminated.
    pub fn on_event(&mut self, side: Side, event: TerminationEvent) -> bool {
        match self {
            // The requester side of these two kinds only ever originates
            // cancel in practice; complete/error are documented no-ops.
            Self::RequestResponse | Self::RequestStream => match side {
                Side::Requester => matches!(event, TerminationEvent::Cancel),
                Side::Responder => true,
            },
            Self::Channel(ChannelStateHolder(state)) => {
                let next = channel_transition(*state, side, event);
                *state = next;
                next == ChannelState::Terminated
            }
        }
    }
}

fn channel_transition(state: ChannelState, side: Side, event: TerminationEvent) -> ChannelState {
    use ChannelState::*;
    use TerminationEvent::*;

    if state == Terminated {
        return Terminated;
    }

    // Any error is unconditionally terminal, as is a requester cancel.
    match (side, event) {
        (_, Error) => Terminated,
        (Side::Requester, Cancel) => Terminated,
        (Side::Requester, Complete) => match state {
            ResponderTerminated => Terminated,
            _ => RequesterTerminated,
        },
        (Side::Responder, Cancel | Complete) => match state {
            RequesterTerminated => Terminated,
            _ => ResponderTerminated,
        },
    }
}

/// Classify a frame as a terminating event, if it is one.
///
/// A PAYLOAD with its completion flag is `complete`; a REQUEST_CHANNEL
/// whose own completion flag is set completes the requester side
/// immediately; CANCEL and ERROR map directly. Everything else is not a
/// terminating event. Fragmented frames (FOLLOWS still set) terminate
/// nothing until the last fragment arrives, so callers classify only
/// assembled frames.
pub fn terminating_event(frame: &Frame) -> Option<TerminationEvent> {
    match &frame.body {
        FrameBody::Payload(b) if b.complete => Some(TerminationEvent::Complete),
        FrameBody::RequestChannel(b) if b.complete => Some(TerminationEvent::Complete),
        FrameBody::Cancel => Some(TerminationEvent::Cancel),
        FrameBody::Error(_) => Some(TerminationEvent::Error),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Payload;

    #[test]
    fn test_request_response_requester_events() {
        let mut behavior = TerminationBehavior::request_response();
        assert!(behavior.on_event(Side::Requester, TerminationEvent::Cancel));
        // Documented-but-dead branches: not terminating.
        assert!(!behavior.on_event(Side::Requester, TerminationEvent::Complete));
        assert!(!behavior.on_event(Side::Requester, TerminationEvent::Error));
    }

    #[test]
    fn test_request_response_responder_events_all_terminate() {
        for event in [
            TerminationEvent::Cancel,
            TerminationEvent::Error,
            TerminationEvent::Complete,
        ] {
            let mut behavior = TerminationBehavior::request_response();
            assert!(behavior.on_event(Side::Responder, event));
        }
    }

    #[test]
    fn test_request_stream_matches_request_response() {
        let mut behavior = TerminationBehavior::request_stream();
        assert!(behavior.on_event(Side::Requester, TerminationEvent::Cancel));
        assert!(!behavior.on_event(Side::Requester, TerminationEvent::Complete));
        assert!(behavior.on_event(Side::Responder, TerminationEvent::Complete));
    }

    #[test]
    fn test_channel_requester_cancel_terminates_immediately() {
        let mut behavior = TerminationBehavior::channel();
        assert!(behavior.on_event(Side::Requester, TerminationEvent::Cancel));
    }

    #[test]
    fn test_channel_error_from_either_side_terminates() {
        let mut behavior = TerminationBehavior::channel();
        assert!(behavior.on_event(Side::Requester, TerminationEvent::Error));

        let mut behavior = TerminationBehavior::channel();
        assert!(behavior.on_event(Side::Responder, TerminationEvent::Error));

        // Even after one side already completed.
        let mut behavior = TerminationBehavior::channel();
        assert!(!behavior.on_event(Side::Requester, TerminationEvent::Complete));
        assert!(behavior.on_event(Side::Responder, TerminationEvent::Error));
    }

    #[test]
    fn test_channel_mutual_completion_requester_first() {
        let mut behavior = TerminationBehavior::channel();
        assert!(!behavior.on_event(Side::Requester, TerminationEvent::Complete));
        assert!(behavior.on_event(Side::Responder, TerminationEvent::Complete));
    }

    #[test]
    fn test_channel_mutual_completion_responder_first() {
        let mut behavior = TerminationBehavior::channel();
        assert!(!behavior.on_event(Side::Responder, TerminationEvent::Complete));
        assert!(behavior.on_event(Side::Requester, TerminationEvent::Complete));
    }

    #[test]
    fn test_channel_responder_cancel_counts_as_completion() {
        let mut behavior = TerminationBehavior::channel();
        assert!(!behavior.on_event(Side::Responder, TerminationEvent::Cancel));
        assert!(behavior.on_event(Side::Requester, TerminationEvent::Complete));
    }

    #[test]
    fn test_channel_one_side_completing_twice_does_not_terminate() {
        let mut behavior = TerminationBehavior::channel();
        assert!(!behavior.on_event(Side::Requester, TerminationEvent::Complete));
        assert!(!behavior.on_event(Side::Requester, TerminationEvent::Complete));
    }

    #[test]
    fn test_termination_is_idempotent() {
        let mut behavior = TerminationBehavior::channel();
        behavior.on_event(Side::Requester, TerminationEvent::Complete);
        assert!(behavior.on_event(Side::Responder, TerminationEvent::Complete));

        // Once terminated, the outcome never changes.
        for side in [Side::Requester, Side::Responder] {
            for event in [
                TerminationEvent::Cancel,
                TerminationEvent::Error,
                TerminationEvent::Complete,
            ] {
                assert!(behavior.on_event(side, event));
            }
        }
    }

    #[test]
    fn test_terminating_event_classification() {
        assert_eq!(
            terminating_event(&Frame::payload_next(1, Payload::from("x"), true)),
            Some(TerminationEvent::Complete)
        );
        assert_eq!(
            terminating_event(&Frame::payload_next(1, Payload::from("x"), false)),
            None
        );
        assert_eq!(
            terminating_event(&Frame::payload_complete(1)),
            Some(TerminationEvent::Complete)
        );
        assert_eq!(
            terminating_event(&Frame::request_channel(1, 5, true, Payload::empty())),
            Some(TerminationEvent::Complete)
        );
        assert_eq!(
            terminating_event(&Frame::request_channel(1, 5, false, Payload::empty())),
            None
        );
        assert_eq!(
            terminating_event(&Frame::cancel(1)),
            Some(TerminationEvent::Cancel)
        );
        assert_eq!(
            terminating_event(&Frame::error(1, 0x0201, "boom")),
            Some(TerminationEvent::Error)
        );
        // Request frames themselves never directly terminate.
        assert_eq!(
            terminating_event(&Frame::request_response(1, Payload::empty())),
            None
        );
        assert_eq!(
            terminating_event(&Frame::request_stream(1, 5, Payload::empty())),
            None
        );
        assert_eq!(terminating_event(&Frame::request_n(1, 5)), None);
    }
}
