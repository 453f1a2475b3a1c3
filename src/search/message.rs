//! Messages exchanged between workers and the transport abstraction that
//! carries them.

use crate::task::{OperatorId, StateId};
use std::time::Duration;

/// Ring termination token. `count` accumulates the work-message deficit of
/// every worker it has visited during the current lap; `clean` is cleared
/// by any worker that received work since it last forwarded the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub count: i64,
    pub clean: bool,
}

impl Token {
    pub fn fresh() -> Self {
        Self {
            count: 0,
            clean: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Concatenated node records (see [`crate::search::wire`]).
    NodeBatch(Vec<u8>),
    /// A goal of `cost` is held by worker `owner`.
    IncumbentUpdate { cost: i32, owner: usize },
    TerminationToken(Token),
    FinalTerminate,
    /// Continue plan reconstruction at the receiver's state `state_ref`.
    /// `operators` are accumulated goal-first.
    PlanContinue {
        state_ref: StateId,
        operators: Vec<OperatorId>,
    },
    PlanComplete,
}

impl Message {
    /// Whether the message counts towards the termination deficit.
    pub fn is_work(&self) -> bool {
        matches!(
            self,
            Message::NodeBatch(_) | Message::IncumbentUpdate { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::NodeBatch(_) => "node-batch",
            Message::IncumbentUpdate { .. } => "incumbent",
            Message::TerminationToken(_) => "token",
            Message::FinalTerminate => "terminate",
            Message::PlanContinue { .. } => "plan-continue",
            Message::PlanComplete => "plan-complete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub from: usize,
    pub message: Message,
}

/// Point-to-point, non-blocking message delivery between a fixed set of
/// workers with ranks `0..world_size`.
///
/// Delivery is eventual and may reorder messages, except that termination
/// tokens between one pair of workers arrive in the order they were sent.
pub trait Transport {
    fn rank(&self) -> usize;

    fn world_size(&self) -> usize;

    /// Fire-and-forget send.
    fn send(&mut self, to: usize, message: Message);

    /// Next available inbound message, if any. Never blocks.
    fn try_recv(&mut self) -> Option<Envelope>;

    /// Block for at most `timeout` until a message is available to
    /// [`try_recv`](Transport::try_recv). Transports that are stepped
    /// externally return immediately.
    fn wait(&mut self, _timeout: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_classification() {
        assert!(Message::NodeBatch(vec![]).is_work());
        assert!(Message::IncumbentUpdate { cost: 1, owner: 0 }.is_work());
        assert!(!Message::TerminationToken(Token::fresh()).is_work());
        assert!(!Message::FinalTerminate.is_work());
        assert!(!Message::PlanComplete.is_work());
        assert!(!Message::PlanContinue {
            state_ref: StateId(0),
            operators: vec![]
        }
        .is_work());
    }
}
