//! # Filter adapter: makes one configuration's feed safe to merge.
//!
//! Each inner configuration has its own evaluation feed. Before the feeds of
//! sibling configurations are merged into one fan-in channel, every passing
//! batch is scrubbed by a [`FilterAdapter`]:
//!
//! - the per-configuration version marker is stripped (it would otherwise
//!   prevent aligning differently-versioned sibling feeds), and
//! - the batch is stamped with its owning [`TargetFramework`].
//!
//! ## Rules
//! - Inner-feed **completion** only drops this adapter's sender clone; the
//!   aggregate keeps running on the remaining clones. A configuration slice
//!   can be torn down without terminating the merged stream.
//! - An unrecoverable [`SourceFault`] **is** propagated, so the aggregate
//!   fails fast instead of hanging.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::source::EvaluationUpdate;
use crate::error::SourceFault;
use crate::model::TargetFramework;

/// One scrubbed batch, stamped with its owning framework.
#[derive(Debug)]
pub(crate) struct TargetedUpdate {
    pub target: TargetFramework,
    pub update: EvaluationUpdate,
}

/// Item flowing through a subscriber's fan-in channel.
#[derive(Debug)]
pub(crate) enum FeedItem {
    /// A scrubbed rule batch.
    Update(TargetedUpdate),
    /// An unrecoverable upstream fault for one configuration.
    Fault {
        target: TargetFramework,
        fault: SourceFault,
    },
}

/// Forwarding stage between one configuration's feed and the fan-in channel.
pub(crate) struct FilterAdapter {
    worker: JoinHandle<()>,
}

impl FilterAdapter {
    /// Attaches the adapter: spawns a forwarding task that runs until the
    /// inner feed completes, a fault is forwarded, the aggregate is gone, or
    /// the generation token is cancelled.
    pub(crate) fn attach(
        target: TargetFramework,
        mut feed: mpsc::Receiver<Result<EvaluationUpdate, SourceFault>>,
        aggregate: mpsc::Sender<FeedItem>,
        cancel: CancellationToken,
    ) -> Self {
        let worker = tokio::spawn(async move {
            loop {
                let item = tokio::select! {
                    _ = cancel.cancelled() => break,
                    item = feed.recv() => item,
                };
                match item {
                    // Inner completion: drop our sender clone only.
                    None => break,
                    Some(Ok(mut update)) => {
                        update.version.configuration = None;
                        let scrubbed = FeedItem::Update(TargetedUpdate {
                            target: target.clone(),
                            update,
                        });
                        if aggregate.send(scrubbed).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(fault)) => {
                        let _ = aggregate
                            .send(FeedItem::Fault {
                                target: target.clone(),
                                fault,
                            })
                            .await;
                        break;
                    }
                }
            }
        });
        Self { worker }
    }

    /// Aborts the forwarding task without waiting for it.
    pub(crate) fn detach(self) {
        self.worker.abort();
    }
}
