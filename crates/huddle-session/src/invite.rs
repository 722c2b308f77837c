//! Invite coordination: who connects to whom, and how hard to try.
//!
//! # The tie-break (for beginners)
//!
//! When two devices discover each other, both *could* initiate a connection –
//! and simultaneous invites in both directions tend to cancel each other out
//! on real transports.  Huddle breaks the tie deterministically: comparing
//! the two identity tokens under their total order, **only the smaller side
//! invites**.  Both devices compute the same comparison, so exactly one side
//! ever initiates.
//!
//! # The retry ladder
//!
//! An invite can silently go nowhere (the peer backgrounded, the radio
//! dropped the frame).  Each endpoint gets a bounded ladder: attempt 1
//! immediately, further attempts every `retry_wait`, and when `max_retries`
//! attempts have all gone unanswered the peer is presumed unreachable and
//! the engine escalates to a full session reset.  If an attempt is *long*
//! stale – more than `invite_timeout + retry_wait` past its eligibility time,
//! e.g. the app was suspended mid-ladder – the ladder restarts from attempt 1
//! instead of spending the remaining attempts on a dead context.
//!
//! At most one retry check is scheduled per endpoint at any time.

use std::time::Duration;

use huddle_core::{EndpointId, LinkState, SessionConfig};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::engine::{Session, SessionState};
use crate::timer::TimerHandle;

/// Scheduled retries fire slightly after the eligibility time so the
/// decision ladder sees an eligible record when the timer lands.
pub(crate) const RETRY_SLACK: Duration = Duration::from_millis(100);

/// Per-endpoint invite bookkeeping.
pub(crate) struct InviteRecord {
    /// Attempts taken so far (1-based).
    pub(crate) attempt: u32,
    /// Earliest time the next attempt may be sent.
    pub(crate) next_eligible: Instant,
    /// Whether a retry check is already scheduled for this endpoint.
    pub(crate) retry_scheduled: bool,
    /// The scheduled retry task, aborted when the record is purged.
    pub(crate) retry_task: Option<TimerHandle>,
}

/// Outcome of running the decision ladder for one endpoint.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum InviteStep {
    /// Send attempt `attempt` now.
    Invite { attempt: u32 },
    /// Too early; a retry check was scheduled for `at`.
    Schedule { at: Instant },
    /// Too early, and a retry check is already pending.
    AlreadyScheduled,
    /// Attempts exhausted – the peer is presumed unreachable.
    Escalate,
}

/// The heart of the coordinator: given the current record and the clock,
/// decide what to do.  Pure so the ladder can be tested without a transport
/// or a running engine.
pub(crate) fn next_invite_step(
    record: Option<&InviteRecord>,
    now: Instant,
    config: &SessionConfig,
) -> InviteStep {
    let Some(record) = record else {
        return InviteStep::Invite { attempt: 1 };
    };

    if now >= record.next_eligible {
        let overdue = now - record.next_eligible;
        if overdue > config.invite_timeout + config.retry_wait {
            // The previous attempt is long stale (e.g. the process was
            // suspended mid-ladder); start over.
            InviteStep::Invite { attempt: 1 }
        } else if record.attempt < config.max_retries {
            InviteStep::Invite {
                attempt: record.attempt + 1,
            }
        } else {
            InviteStep::Escalate
        }
    } else if record.retry_scheduled {
        InviteStep::AlreadyScheduled
    } else {
        InviteStep::Schedule {
            at: record.next_eligible,
        }
    }
}

impl Session {
    /// Runs the eligibility gate and the decision ladder for `endpoint`,
    /// updating the invite record in place.  Must be called with the state
    /// lock held; returns the step for the caller to apply once the lock is
    /// released.  `None` means this side does not invite this endpoint.
    pub(crate) fn invite_step_locked(
        &self,
        state: &mut SessionState,
        endpoint: &EndpointId,
    ) -> Option<InviteStep> {
        let peer_id = state.directory.resolve(endpoint)?.id.clone();

        // Deterministic tie-break: only the smaller identity invites.
        if self.local_peer().id >= peer_id {
            return None;
        }
        if matches!(
            state.links.get(endpoint),
            Some(LinkState::Connecting | LinkState::Connected)
        ) {
            return None;
        }
        if self.transport().is_channel_open(endpoint) {
            return None;
        }

        let now = Instant::now();
        let step = next_invite_step(state.invites.get(endpoint), now, self.config());

        match &step {
            InviteStep::Invite { attempt } => {
                // Record the attempt before the network call so a concurrent
                // event re-running the ladder sees it as taken, and schedule
                // the follow-up check that keeps the ladder self-driving when
                // the peer never answers.
                let next_eligible = now + self.config().retry_wait;
                state.invites.insert(
                    endpoint.clone(),
                    InviteRecord {
                        attempt: *attempt,
                        next_eligible,
                        retry_scheduled: true,
                        retry_task: Some(self.spawn_retry(endpoint, next_eligible)),
                    },
                );
            }
            InviteStep::Schedule { at } => {
                let task = self.spawn_retry(endpoint, *at);
                if let Some(record) = state.invites.get_mut(endpoint) {
                    record.retry_scheduled = true;
                    record.retry_task = Some(task);
                }
            }
            InviteStep::AlreadyScheduled | InviteStep::Escalate => {}
        }

        Some(step)
    }

    /// Performs the side of an [`InviteStep`] that needs the network (or the
    /// reset escalation).  Called without the state lock.
    pub(crate) async fn apply_invite_step(&self, endpoint: &EndpointId, step: Option<InviteStep>) {
        match step {
            Some(InviteStep::Invite { attempt }) => {
                info!("inviting {endpoint} (attempt {attempt})");
                if let Err(e) = self
                    .transport()
                    .invite(endpoint, self.config().invite_timeout)
                    .await
                {
                    warn!("invite to {endpoint} failed: {e}");
                }
            }
            Some(InviteStep::Escalate) => {
                error!(
                    "no connection to {endpoint} after {} invite attempts; resetting session",
                    self.config().max_retries
                );
                self.reset().await;
            }
            Some(InviteStep::Schedule { .. }) => {
                debug!("too early to re-invite {endpoint}; retry scheduled");
            }
            Some(InviteStep::AlreadyScheduled) => {
                debug!("retry for {endpoint} already scheduled");
            }
            None => {}
        }
    }

    fn spawn_retry(&self, endpoint: &EndpointId, at: Instant) -> TimerHandle {
        let generation = self.generation();
        let me = self.weak_self();
        let target = endpoint.clone();
        TimerHandle::new(tokio::spawn(async move {
            tokio::time::sleep_until(at + RETRY_SLACK).await;
            let Some(session) = me.upgrade() else { return };
            session.on_invite_retry(&target, generation).await;
        }))
    }

    /// Entry point for a fired retry timer.  Stale timers – from a previous
    /// session generation, or for an endpoint whose record was purged while
    /// the timer slept – are no-ops.
    pub(crate) async fn on_invite_retry(&self, endpoint: &EndpointId, generation: u64) {
        if self.generation() != generation {
            return;
        }
        let step = {
            let mut state = self.lock_state();
            match state.invites.get_mut(endpoint) {
                Some(record) => {
                    record.retry_scheduled = false;
                    // This task is the one that was scheduled; detach rather
                    // than abort ourselves out from under the work below.
                    if let Some(task) = record.retry_task.take() {
                        task.detach();
                    }
                }
                None => return,
            }
            self.invite_step_locked(&mut state, endpoint)
        };
        self.apply_invite_step(endpoint, step).await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
