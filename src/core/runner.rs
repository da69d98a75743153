//! # Supervisor task: drive one handler from acquire to release.
//!
//! ## Flow
//! ```text
//! publish WorkerStarting
//! ┌─ panic boundary ──────────────────────────────────────────────────────┐
//! │ acquire() ── Err(e) ──► AcquireFailed, kill(Some(e)) ─────────────┐   │
//! │    │ Ok(watcher)                                                  │   │
//! │    ▼                                                              │   │
//! │ loop select! (biased)                                             │   │
//! │   dying.cancelled()        ─────────────────────────────────────►─┤   │
//! │   next_change() = Some(c)  ──► react(c) ─ Err(e) ─► ReactFailed,  │   │
//! │                                   │               kill(Some(e)) ─►┤   │
//! │                                   └─ Ok ─► handled += 1, loop     │   │
//! │   next_change() = None     ──► WatcherClosed, classify(err()),   │   │
//! │                                kill(verdict) ────────────────────►┘   │
//! └───────────────────────────────────────────────────────────────────────┘
//!   panic ──► WorkerPanicked, kill(Some(Panicked))
//! kill(None)
//! watcher.stop()  ──► WatcherStopped, fold Failed(e)
//! release()       ──► ReleaseFailed,  fold Err(e)
//! seal reason, publish WorkerDead, release waiters
//! ```
//!
//! ## Rules
//! - `react` calls are strictly sequential and never start once dying.
//! - The watcher is stopped at most once, and only if `acquire` succeeded.
//! - `release` runs exactly once on every path, panics included.
//! - The death reason is sealed only after `release` returned.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use super::closed::{ClosedHandler, classify};
use super::supervisor::{Killer, Shared};
use crate::error::WorkerError;
use crate::events::EventKind;
use crate::handler::NotifyHandler;
use crate::watcher::{Termination, Watcher};

pub(crate) async fn run<H: NotifyHandler>(mut handler: H, shared: Arc<Shared>, closed: ClosedHandler) {
    let killer = Killer {
        shared: Arc::clone(&shared),
    };
    tracing::debug!(worker = %shared.name, id = shared.id, "worker starting");
    shared.publish(shared.event(EventKind::WorkerStarting));

    let mut slot: Option<H::Watcher> = None;
    let body = AssertUnwindSafe(watch_loop(&mut handler, &mut slot, &killer, &closed))
        .catch_unwind()
        .await;
    if let Err(payload) = body {
        shared.panicked("watch loop", &*payload);
    }
    shared.kill(None);

    if let Some(mut watcher) = slot {
        match AssertUnwindSafe(watcher.stop()).catch_unwind().await {
            Ok(t) => {
                shared.publish(shared.event(EventKind::WatcherStopped).with_reason(t.to_string()));
                if let Some(err) = t.into_error() {
                    shared.commit(err);
                }
            }
            Err(payload) => shared.panicked("watcher stop", &*payload),
        }
    }

    match AssertUnwindSafe(handler.release()).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            tracing::warn!(worker = %shared.name, id = shared.id, error = %err, "release failed");
            shared.publish(shared.event(EventKind::ReleaseFailed).with_reason(err.to_string()));
            shared.commit(err);
        }
        Err(payload) => shared.panicked("release", &*payload),
    }

    shared.finish();
    tracing::debug!(worker = %shared.name, id = shared.id, handled = shared.handled(), "worker dead");
}

async fn watch_loop<H: NotifyHandler>(
    handler: &mut H,
    slot: &mut Option<H::Watcher>,
    killer: &Killer,
    closed: &ClosedHandler,
) {
    let shared = &killer.shared;

    let watcher = match handler.acquire().await {
        Ok(w) => slot.insert(w),
        Err(err) => {
            tracing::warn!(worker = %shared.name, id = shared.id, error = %err, "acquire failed");
            shared.publish(shared.event(EventKind::AcquireFailed).with_reason(err.to_string()));
            shared.kill(Some(err));
            return;
        }
    };

    loop {
        tokio::select! {
            biased;

            _ = shared.dying.cancelled() => return,

            change = watcher.next_change() => match change {
                Some(change) => {
                    if let Err(err) = handler.react(change, killer).await {
                        tracing::warn!(worker = %shared.name, id = shared.id, error = %err, "react failed");
                        shared.publish(
                            shared
                                .event(EventKind::ReactFailed)
                                .with_reason(err.to_string())
                                .with_handled(shared.handled()),
                        );
                        shared.kill(Some(err));
                        return;
                    }
                    shared.bump_handled();
                }
                None => {
                    let reason = watcher.err();
                    shared.publish(shared.event(EventKind::WatcherClosed).with_reason(reason.to_string()));
                    let verdict = match classify(closed, reason) {
                        Ok(verdict) => verdict,
                        Err(fault) => {
                            tracing::error!(worker = %shared.name, id = shared.id, %fault, "closed-channel classifier fault");
                            shared.publish(shared.event(EventKind::ClassifierFault).with_reason(fault.as_str()));
                            Termination::Failed(WorkerError::Fatal { error: fault })
                        }
                    };
                    shared.kill(verdict.into_error());
                    return;
                }
            },
        }
    }
}
