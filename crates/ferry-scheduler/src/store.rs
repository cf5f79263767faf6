//! In-memory registries of builds and agents.
//!
//! Builds and agents live in append-only tables indexed by their ids; records
//! are never removed, only transitioned. The store also owns the assignment
//! map (build → agent executing it) and the set of in-flight offers (pairings
//! whose dispatch has not been answered yet).

use chrono::Utc;
use ferry_core::agent::{Agent, AgentAddress, AgentState};
use ferry_core::build::{Build, BuildOutcome, BuildState};
use ferry_core::ids::{AgentId, BuildId};
use ferry_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stderr given to a build whose agent re-registered while running it.
pub const ABANDONED_MESSAGE: &str = "agent re-registered while building";

/// How a registration for an already-known address is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationPolicy {
    /// Reuse the existing record for the address.
    #[default]
    Upsert,
    /// Always append a new record, even for a known address.
    Append,
}

/// What a registration did to the agent table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added(AgentId),
    /// Address already known and idle; nothing changed.
    Existing(AgentId),
    /// Address already known in ERROR; moved back to PENDING.
    Revived(AgentId),
    /// Address already known and BUILDING. The agent restarted and lost its
    /// build, which is finalized as FAILURE; the agent is PENDING again.
    Restarted {
        agent: AgentId,
        orphaned: Option<BuildId>,
    },
}

impl Registration {
    pub fn agent_id(&self) -> AgentId {
        match *self {
            Registration::Added(id) | Registration::Existing(id) | Registration::Revived(id) => id,
            Registration::Restarted { agent, .. } => agent,
        }
    }
}

/// A pairing chosen by the matcher, awaiting the agent's answer.
#[derive(Debug, Clone)]
pub struct Offer {
    pub build: Build,
    pub agent_id: AgentId,
    pub address: AgentAddress,
}

/// Owned store of builds, agents and assignments.
#[derive(Debug, Default)]
pub struct BuildStore {
    builds: Vec<Build>,
    agents: Vec<Agent>,
    assignments: HashMap<BuildId, AgentId>,
    offers: HashMap<BuildId, AgentId>,
    policy: RegistrationPolicy,
}

impl BuildStore {
    pub fn new(policy: RegistrationPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// Append a new PENDING build and return its id.
    pub fn enqueue(&mut self, revision: impl Into<String>, command: impl Into<String>) -> BuildId {
        let id = BuildId::new(self.builds.len() as u64);
        self.builds.push(Build::new(id, revision, command));
        id
    }

    /// Record an agent registration according to the store's policy.
    pub fn register(&mut self, address: AgentAddress) -> Registration {
        if self.policy == RegistrationPolicy::Upsert
            && let Some(index) = self.agents.iter().position(|a| a.address == address)
        {
            let id = self.agents[index].id;
            return match self.agents[index].state {
                AgentState::Pending => Registration::Existing(id),
                AgentState::Error => {
                    self.agents[index].state = AgentState::Pending;
                    Registration::Revived(id)
                }
                AgentState::Building => Registration::Restarted {
                    agent: id,
                    orphaned: self.abandon_assignment(id),
                },
            };
        }

        let id = AgentId::new(self.agents.len());
        self.agents.push(Agent::new(id, address));
        Registration::Added(id)
    }

    /// PENDING builds not currently on offer, oldest first.
    pub fn pending_builds(&self) -> Vec<BuildId> {
        self.builds
            .iter()
            .filter(|b| b.is_pending() && !self.offers.contains_key(&b.id))
            .map(|b| b.id)
            .collect()
    }

    /// PENDING agents not currently on offer, in registration order.
    pub fn pending_agents(&self) -> Vec<AgentId> {
        self.agents
            .iter()
            .filter(|a| a.is_available() && !self.offers.values().any(|id| *id == a.id))
            .map(|a| a.id)
            .collect()
    }

    /// Pair the k-th oldest pending build with the k-th oldest pending agent
    /// and record each pairing as an offer.
    pub fn plan_offers(&mut self) -> Vec<Offer> {
        let pairs: Vec<(BuildId, AgentId)> = self
            .pending_builds()
            .into_iter()
            .zip(self.pending_agents())
            .collect();

        let mut offers = Vec::with_capacity(pairs.len());
        for (build_id, agent_id) in pairs {
            self.offers.insert(build_id, agent_id);
            offers.push(Offer {
                build: self.builds[build_id.get() as usize].clone(),
                agent_id,
                address: self.agents[agent_id.get()].address.clone(),
            });
        }
        offers
    }

    /// The agent accepted the offer: build → IN_PROGRESS, agent → BUILDING.
    ///
    /// Returns `None` when the offer is gone, which happens if the agent's
    /// result report was processed before the dispatch acknowledgement.
    pub fn accept_offer(&mut self, build_id: BuildId) -> Option<AgentId> {
        let agent_id = self.offers.remove(&build_id)?;
        let build = &mut self.builds[build_id.get() as usize];
        build.state = BuildState::InProgress;
        build.started_at = Some(Utc::now());
        self.agents[agent_id.get()].state = AgentState::Building;
        self.assignments.insert(build_id, agent_id);
        Some(agent_id)
    }

    /// The dispatch failed at the transport level: agent → ERROR, build stays PENDING.
    pub fn reject_offer(&mut self, build_id: BuildId) -> Option<AgentId> {
        let agent_id = self.offers.remove(&build_id)?;
        self.agents[agent_id.get()].state = AgentState::Error;
        Some(agent_id)
    }

    /// Apply a result report and release the agent that ran the build.
    pub fn complete(
        &mut self,
        build_id: BuildId,
        outcome: BuildOutcome,
        stdout: String,
        stderr: String,
    ) -> Result<AgentId> {
        if build_id.get() as usize >= self.builds.len() {
            return Err(Error::UnknownBuild(build_id));
        }

        // A result proves the agent accepted the build, even if its
        // acknowledgement has not been processed yet.
        if self.offers.contains_key(&build_id) {
            self.accept_offer(build_id);
        }

        let agent_id = self
            .assignments
            .remove(&build_id)
            .ok_or(Error::NoAssignment(build_id))?;

        let build = &mut self.builds[build_id.get() as usize];
        build.state = outcome.into();
        build.stdout = stdout;
        build.stderr = stderr;
        build.completed_at = Some(Utc::now());

        self.agents[agent_id.get()].state = AgentState::Pending;
        Ok(agent_id)
    }

    /// Fail the build assigned to `agent_id` and return the agent to PENDING.
    fn abandon_assignment(&mut self, agent_id: AgentId) -> Option<BuildId> {
        let orphaned = self
            .assignments
            .iter()
            .find(|(_, agent)| **agent == agent_id)
            .map(|(build, _)| *build);

        if let Some(build_id) = orphaned {
            self.assignments.remove(&build_id);
            let build = &mut self.builds[build_id.get() as usize];
            build.state = BuildState::Failure;
            build.stderr = ABANDONED_MESSAGE.to_string();
            build.completed_at = Some(Utc::now());
        }

        self.agents[agent_id.get()].state = AgentState::Pending;
        orphaned
    }

    /// Record the outcome of a liveness probe. Scheduling state is untouched.
    pub fn record_probe(&mut self, agent_id: AgentId, reachable: bool) {
        if let Some(agent) = self.agents.get_mut(agent_id.get()) {
            agent.reachable = Some(reachable);
            if reachable {
                agent.last_seen_at = Some(Utc::now());
            }
        }
    }

    pub fn build(&self, id: BuildId) -> Option<&Build> {
        self.builds.get(id.get() as usize)
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id.get())
    }

    pub fn builds(&self) -> &[Build] {
        &self.builds
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn assignment(&self, build_id: BuildId) -> Option<AgentId> {
        self.assignments.get(&build_id).copied()
    }

    /// Check the cross-table invariants: every IN_PROGRESS build has exactly
    /// one assignment, every assigned agent is BUILDING, and every BUILDING
    /// agent holds exactly one assignment.
    pub fn verify_invariants(&self) -> std::result::Result<(), String> {
        for build in &self.builds {
            let assigned = self.assignments.get(&build.id);
            match (build.state, assigned) {
                (BuildState::InProgress, None) => {
                    return Err(format!("{} is in progress without an assignment", build.id));
                }
                (state, Some(_)) if state != BuildState::InProgress => {
                    return Err(format!("{} is {} but still assigned", build.id, state));
                }
                _ => {}
            }
        }

        for (build_id, agent_id) in &self.assignments {
            let agent = self
                .agent(*agent_id)
                .ok_or_else(|| format!("{} assigned to unknown {}", build_id, agent_id))?;
            if agent.state != AgentState::Building {
                return Err(format!("{} runs {} but is {}", agent_id, build_id, agent.state));
            }
        }

        for agent in &self.agents {
            let held = self.assignments.values().filter(|id| **id == agent.id).count();
            if agent.state == AgentState::Building && held != 1 {
                return Err(format!("{} is building with {} assignments", agent.id, held));
            }
        }

        Ok(())
    }
}
