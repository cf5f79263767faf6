//! Main scheduler orchestration.
//!
//! Every mutating operation (submit, register, report) applies its store
//! change and then starts a matching pass in the background, so callers are
//! acknowledged without waiting on dispatch calls. The store lock is only
//! held for synchronous bookkeeping; dispatch network calls run with the
//! lock released and their outcome is applied afterwards.

use crate::store::{BuildStore, Offer, Registration, RegistrationPolicy};
use ferry_core::Result;
use ferry_core::agent::{Agent, AgentAddress};
use ferry_core::build::Build;
use ferry_core::ids::{AgentId, BuildId};
use ferry_core::ports::AgentTransport;
use ferry_core::protocol::{BuildCommand, BuildResultReport};
use ferry_trace::agent_span;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, warn};

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Repository location sent to agents with every dispatch.
    #[serde(default = "default_source_location")]
    pub source_location: String,
    /// Handling of registrations for an already-known address.
    #[serde(default)]
    pub registration_policy: RegistrationPolicy,
}

fn default_source_location() -> String {
    ".".to_string()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            source_location: default_source_location(),
            registration_policy: RegistrationPolicy::default(),
        }
    }
}

/// Outcome of one matching pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MatchSummary {
    pub dispatched: Vec<(BuildId, AgentId)>,
    pub failed: Vec<(BuildId, AgentId)>,
}

impl MatchSummary {
    pub fn is_empty(&self) -> bool {
        self.dispatched.is_empty() && self.failed.is_empty()
    }
}

/// Counts a matching pass as finished when dropped, panics included.
struct PassGuard<'a>(&'a watch::Sender<usize>);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// The coordinator's scheduler service.
pub struct Scheduler {
    config: SchedulerConfig,
    store: Mutex<BuildStore>,
    transport: Arc<dyn AgentTransport>,
    /// Number of matching passes started but not finished.
    passes: watch::Sender<usize>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, transport: Arc<dyn AgentTransport>) -> Self {
        let store = BuildStore::new(config.registration_policy);
        let (passes, _) = watch::channel(0);
        Self {
            config,
            store: Mutex::new(store),
            transport,
            passes,
        }
    }

    /// Queue a build and try to place it.
    pub async fn submit_build(
        self: &Arc<Self>,
        revision: impl Into<String>,
        command: impl Into<String>,
    ) -> BuildId {
        let (revision, command) = (revision.into(), command.into());
        let build_id = self.store.lock().await.enqueue(&revision, &command);
        info!(build_id = %build_id, revision = %revision, command = %command, "Build queued");

        self.spawn_matching();
        build_id
    }

    /// Register an agent and try to give it work.
    pub async fn register_agent(self: &Arc<Self>, address: AgentAddress) -> AgentId {
        let registration = self.store.lock().await.register(address.clone());
        match registration {
            Registration::Added(id) => {
                info!(agent_id = %id, address = %address, "Agent registered")
            }
            Registration::Existing(id) => {
                info!(agent_id = %id, address = %address, "Agent re-registered")
            }
            Registration::Revived(id) => {
                warn!(agent_id = %id, address = %address, "Agent re-registered after dispatch error")
            }
            Registration::Restarted { agent, orphaned } => match orphaned {
                Some(build_id) => warn!(
                    agent_id = %agent,
                    address = %address,
                    build_id = %build_id,
                    "Agent re-registered while building, build marked failed"
                ),
                None => warn!(agent_id = %agent, address = %address, "Agent re-registered while building"),
            },
        }

        self.spawn_matching();
        registration.agent_id()
    }

    /// Apply a build result reported by an agent, then re-run matching.
    pub async fn report_result(self: &Arc<Self>, report: BuildResultReport) -> Result<()> {
        let build_id = report.build_id;
        let outcome = report.state;

        let agent_id = {
            let mut store = self.store.lock().await;
            let agent_id = store
                .complete(build_id, outcome, report.stdout, report.stderr)
                .inspect_err(|e| error!(build_id = %build_id, error = %e, "Rejected build result"))?;
            debug_assert!(store.verify_invariants().is_ok());
            agent_id
        };

        info!(build_id = %build_id, agent_id = %agent_id, state = %outcome, "Build completed");

        self.spawn_matching();
        Ok(())
    }

    /// Start a matching pass on its own task.
    pub fn spawn_matching(self: &Arc<Self>) -> JoinHandle<MatchSummary> {
        self.passes.send_modify(|n| *n += 1);
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let _pass = PassGuard(&scheduler.passes);
            scheduler.run_matching().await
        })
    }

    /// Wait until every matching pass started so far has finished.
    pub async fn settle(&self) {
        let mut passes = self.passes.subscribe();
        let _ = passes.wait_for(|n| *n == 0).await;
    }

    /// One bounded greedy pass: pair pending builds with idle agents
    /// positionally and dispatch every pairing concurrently. Each dispatch
    /// outcome is applied independently of the others.
    pub async fn run_matching(&self) -> MatchSummary {
        let offers = self.store.lock().await.plan_offers();
        if offers.is_empty() {
            return MatchSummary::default();
        }

        debug!(pairings = offers.len(), "Dispatching matched builds");

        let outcomes = join_all(offers.into_iter().map(|offer| {
            let span = agent_span(&offer.address, "dispatch");
            self.dispatch(offer).instrument(span)
        }))
        .await;

        let mut summary = MatchSummary::default();
        for (pair, accepted) in outcomes {
            if accepted {
                summary.dispatched.push(pair);
            } else {
                summary.failed.push(pair);
            }
        }
        summary
    }

    async fn dispatch(&self, offer: Offer) -> ((BuildId, AgentId), bool) {
        let build_id = offer.build.id;
        let command = BuildCommand::for_build(&offer.build, &self.config.source_location);
        let result = self.transport.dispatch(&offer.address, &command).await;

        let mut store = self.store.lock().await;
        let accepted = match result {
            Ok(()) => {
                if store.accept_offer(build_id).is_some() {
                    info!(
                        build_id = %build_id,
                        revision = %offer.build.revision,
                        command = %offer.build.command,
                        agent = %offer.address,
                        "Build dispatched"
                    );
                } else {
                    debug!(build_id = %build_id, "Dispatch acknowledged after result");
                }
                true
            }
            Err(e) => {
                if store.reject_offer(build_id).is_some() {
                    error!(
                        build_id = %build_id,
                        agent = %offer.address,
                        error = %e,
                        "Dispatch failed, agent marked as errored"
                    );
                } else {
                    warn!(build_id = %build_id, error = %e, "Dispatch failed after result was reported");
                }
                false
            }
        };
        debug_assert!(store.verify_invariants().is_ok());

        ((build_id, offer.agent_id), accepted)
    }

    /// Snapshot of every build, oldest first.
    pub async fn builds(&self) -> Vec<Build> {
        self.store.lock().await.builds().to_vec()
    }

    pub async fn build(&self, id: BuildId) -> Option<Build> {
        self.store.lock().await.build(id).cloned()
    }

    /// Snapshot of every agent, in registration order.
    pub async fn agents(&self) -> Vec<Agent> {
        self.store.lock().await.agents().to_vec()
    }

    pub async fn record_probe(&self, agent_id: AgentId, reachable: bool) {
        self.store.lock().await.record_probe(agent_id, reachable);
    }

    pub async fn verify_invariants(&self) -> std::result::Result<(), String> {
        self.store.lock().await.verify_invariants()
    }

    pub fn transport(&self) -> Arc<dyn AgentTransport> {
        Arc::clone(&self.transport)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}
