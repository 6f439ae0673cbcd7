use std::collections::VecDeque;

use tracing::debug;

use crate::{
    Action,
    environment::EnvironmentView,
    planner::{PlanOutcome, Planner},
};

/// Trait defining the behavior of an agent.
/// Agents decide which action to take based on the EnvironmentView.
pub trait Agent {
    /// Determines the action the agent wants to perform based on its view of the environment.
    /// `&mut self` allows the agent to maintain internal state for decision making.
    ///
    /// Returns `None` once the agent has nothing left to do.
    fn get_action(&mut self, view: &EnvironmentView) -> Option<Action>;
}

/// An offline agent: plans the whole episode on its first turn, then replays it.
#[derive(Debug, Default)]
pub struct PlanningAgent {
    planner: Planner,
    outcome: Option<PlanOutcome>,
    current_plan: VecDeque<Action>,
}

impl PlanningAgent {
    pub fn new(planner: Planner) -> Self {
        Self {
            planner,
            outcome: None,
            current_plan: VecDeque::new(),
        }
    }

    /// How planning went, once the first action has been requested.
    pub fn outcome(&self) -> Option<PlanOutcome> {
        self.outcome
    }

    /// Actions still queued.
    pub fn remaining(&self) -> impl Iterator<Item = &Action> {
        self.current_plan.iter()
    }
}

impl Agent for PlanningAgent {
    fn get_action(&mut self, view: &EnvironmentView) -> Option<Action> {
        if self.outcome.is_none() {
            let plan = self.planner.plan(view.world);
            debug!(outcome = ?plan.outcome, actions = plan.actions.len(), "Planned episode");
            self.outcome = Some(plan.outcome);
            self.current_plan = plan.actions.into();
        }

        self.current_plan.pop_front()
    }
}
