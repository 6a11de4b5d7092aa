//! Completion detection for one submitted request.
//!
//! The external side offers no completion event, only observable page
//! state, so detection runs as a bounded sequence of polls: wait for the
//! first output block, wait for the busy indicator to clear, then require a
//! configured number of consecutive identical reads of the newest block
//! before calling the content final. The cancellation token is observed
//! once per poll cycle; streaming and stabilization have no own timeout.

use std::sync::Arc;

use tokio::time::Instant;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;

use crate::backend::ConversationSession;
use crate::backend::IndicatorKind;
use crate::backend::OutputBlock;
use crate::config::CourierConfig;
use crate::errors::BlockReadError;
use crate::errors::SessionError;
use crate::outcome::ReplyOutcome;
use crate::suggest;

/// Where one request currently sits in the detection protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitingFirstToken,
    Streaming,
    Stabilizing,
}

pub(crate) struct ReplyDetector<'a> {
    session: &'a dyn ConversationSession,
    config: &'a CourierConfig,
    prompt: &'a str,
}

impl<'a> ReplyDetector<'a> {
    pub(crate) fn new(
        session: &'a dyn ConversationSession,
        config: &'a CourierConfig,
        prompt: &'a str,
    ) -> Self {
        Self {
            session,
            config,
            prompt,
        }
    }

    /// Submits the prompt and polls until the reply is final, a failure is
    /// classified, or the token is cancelled. Never returns an error: every
    /// failure mode is a [`ReplyOutcome`] variant.
    pub(crate) async fn run(&self, cancel: &CancellationToken) -> ReplyOutcome {
        let baseline = match self.session.output_blocks().await {
            Ok(blocks) => blocks.len(),
            Err(err) => return self.interrupted(cancel, &err),
        };
        if let Err(err) = self.session.submit(self.prompt).await {
            return self.interrupted(cancel, &err);
        }

        let deadline = Instant::now() + self.config.first_reply_timeout;
        let mut phase = Phase::AwaitingFirstToken;
        let mut newest: Option<Arc<dyn OutputBlock>> = None;
        let mut last_read = String::new();
        let mut stable_reads: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return ReplyOutcome::Cancelled;
            }

            match phase {
                Phase::AwaitingFirstToken => {
                    let blocks = match self.session.output_blocks().await {
                        Ok(blocks) => blocks,
                        Err(err) => return self.interrupted(cancel, &err),
                    };
                    if blocks.len() > baseline {
                        debug!(blocks = blocks.len(), "first output block visible");
                        phase = Phase::Streaming;
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return ReplyOutcome::Timeout;
                    }
                }
                Phase::Streaming => {
                    match self.session.indicator(IndicatorKind::Busy).await {
                        Ok(true) => {}
                        Ok(false) => {
                            phase = Phase::Stabilizing;
                            continue;
                        }
                        Err(err) => return self.interrupted(cancel, &err),
                    }
                }
                Phase::Stabilizing => {
                    let block = match &newest {
                        Some(block) => Arc::clone(block),
                        None => match self.resolve_newest(cancel).await {
                            Ok(Some(block)) => {
                                newest = Some(Arc::clone(&block));
                                block
                            }
                            // Blocks vanished (external reset); keep polling,
                            // cancellation will end a drained request.
                            Ok(None) => {
                                if let Err(outcome) = self.pause(cancel).await {
                                    return outcome;
                                }
                                continue;
                            }
                            Err(outcome) => return outcome,
                        },
                    };
                    match block.text().await {
                        Ok(text) => {
                            if text == last_read {
                                stable_reads += 1;
                            } else {
                                trace!(len = text.len(), "reply text still changing");
                                stable_reads = 0;
                                last_read = text;
                            }
                            if stable_reads >= self.config.stability_threshold {
                                return self.classify(cancel, last_read).await;
                            }
                        }
                        Err(BlockReadError::Stale) => {
                            // Element identity is not reliable; fall back to
                            // re-resolving the newest block next cycle.
                            trace!("newest output block went stale; re-resolving");
                            newest = None;
                        }
                        Err(BlockReadError::Failed { reason }) => {
                            return self.interrupted(cancel, &SessionError::unreachable(reason));
                        }
                    }
                }
            }

            if let Err(outcome) = self.pause(cancel).await {
                return outcome;
            }
        }
    }

    /// One poll-interval sleep that loses the race against cancellation.
    async fn pause(&self, cancel: &CancellationToken) -> Result<(), ReplyOutcome> {
        tokio::select! {
            _ = cancel.cancelled() => Err(ReplyOutcome::Cancelled),
            _ = sleep(self.config.poll_interval) => Ok(()),
        }
    }

    async fn resolve_newest(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<dyn OutputBlock>>, ReplyOutcome> {
        match self.session.output_blocks().await {
            Ok(blocks) => Ok(blocks.last().map(Arc::clone)),
            Err(err) => Err(self.interrupted(cancel, &err)),
        }
    }

    /// Post-hoc error classification, then augmentation of a real answer.
    async fn classify(&self, cancel: &CancellationToken, text: String) -> ReplyOutcome {
        for (kind, outcome) in [
            (IndicatorKind::Retry, ReplyOutcome::RateLimited),
            (IndicatorKind::UsageLimit, ReplyOutcome::UsageLimited),
            (IndicatorKind::Failure, ReplyOutcome::ExternalFailure),
        ] {
            match self.session.indicator(kind).await {
                Ok(true) => return outcome,
                Ok(false) => {}
                Err(err) => return self.interrupted(cancel, &err),
            }
        }

        let mut text = text;
        if suggest::wants_video_link(self.prompt) {
            text.push_str(&suggest::video_link_suffix(self.prompt));
        }
        ReplyOutcome::Answer(text)
    }

    /// A session error during a cancelled request is just the abort; the
    /// external reset races with in-flight reads by design.
    fn interrupted(&self, cancel: &CancellationToken, err: &dyn std::error::Error) -> ReplyOutcome {
        if cancel.is_cancelled() {
            ReplyOutcome::Cancelled
        } else {
            debug!(error = %err, "session communication failed mid-request");
            ReplyOutcome::SessionFailure
        }
    }
}
