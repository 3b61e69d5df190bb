// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Acknowledgment Policy
//!
//! Every handler returns one of three [`AckDecision`]s and every delivery is
//! resolved with exactly one acknowledgment frame. No acknowledgment leaves the
//! delivery occupying the channel's prefetch window forever; two of them is a
//! protocol error that closes the channel.

use crate::errors::AmqpError;
use async_trait::async_trait;
use lapin::{
    acker::Acker,
    options::{BasicAckOptions, BasicNackOptions},
};
use tracing::error;

/// Outcome of handling one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDecision {
    /// Processed, or deliberately ignored. The message leaves the queue.
    Accept,
    /// Transient failure. The message goes back to the head of the queue and
    /// is redelivered with its redelivered flag set.
    ///
    /// A consumer that always requeues loops forever; bounding retries is the
    /// handler's job.
    RejectRequeue,
    /// Permanent failure. The message leaves the queue and is routed to the
    /// queue's dead-letter exchange.
    RejectDiscard,
}

/// Sends the acknowledgment frame for one delivery.
///
/// Implemented for lapin's [`Acker`]; the seam exists so dispatch can be
/// exercised without a broker.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<(), AmqpError>;

    async fn nack(&self, requeue: bool) -> Result<(), AmqpError>;
}

#[async_trait]
impl Acknowledger for Acker {
    async fn ack(&self) -> Result<(), AmqpError> {
        Acker::ack(self, BasicAckOptions { multiple: false })
            .await
            .map(|_| ())
            .map_err(|err| {
                error!(error = err.to_string(), "error whiling ack msg");
                AmqpError::AckMessageError
            })
    }

    async fn nack(&self, requeue: bool) -> Result<(), AmqpError> {
        Acker::nack(
            self,
            BasicNackOptions {
                multiple: false,
                requeue,
            },
        )
        .await
        .map(|_| ())
        .map_err(|err| {
            error!(error = err.to_string(), requeue, "error whiling nack msg");
            AmqpError::NackMessageError
        })
    }
}

/// Carries out `decision` with exactly one acknowledgment frame.
pub async fn acknowledge<A>(acker: &A, decision: AckDecision) -> Result<(), AmqpError>
where
    A: Acknowledger + ?Sized,
{
    match decision {
        AckDecision::Accept => acker.ack().await,
        AckDecision::RejectRequeue => acker.nack(true).await,
        AckDecision::RejectDiscard => acker.nack(false).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn accept_sends_a_single_ack() {
        let mut acker = MockAcknowledger::new();
        acker.expect_ack().times(1).returning(|| Ok(()));
        acker.expect_nack().never();

        acknowledge(&acker, AckDecision::Accept).await.unwrap();
    }

    #[tokio::test]
    async fn reject_requeue_sends_a_single_requeueing_nack() {
        let mut acker = MockAcknowledger::new();
        acker.expect_ack().never();
        acker
            .expect_nack()
            .with(eq(true))
            .times(1)
            .returning(|_| Ok(()));

        acknowledge(&acker, AckDecision::RejectRequeue).await.unwrap();
    }

    #[tokio::test]
    async fn reject_discard_sends_a_single_dropping_nack() {
        let mut acker = MockAcknowledger::new();
        acker.expect_ack().never();
        acker
            .expect_nack()
            .with(eq(false))
            .times(1)
            .returning(|_| Ok(()));

        acknowledge(&acker, AckDecision::RejectDiscard).await.unwrap();
    }

    #[tokio::test]
    async fn broker_failure_is_reported() {
        let mut acker = MockAcknowledger::new();
        acker
            .expect_ack()
            .times(1)
            .returning(|| Err(AmqpError::AckMessageError));

        let res = acknowledge(&acker, AckDecision::Accept).await;

        assert_eq!(res, Err(AmqpError::AckMessageError));
    }
}
