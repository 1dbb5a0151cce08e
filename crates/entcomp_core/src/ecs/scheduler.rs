//! # System Scheduling
//!
//! Systems run in the order their components were registered. There is no
//! priority beyond that: unregistering a component drops it from the order,
//! and registering it again appends it at the end.

/// Which frame callback is being driven.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Simulation step, runs `system` callbacks.
    Tick,
    /// Presentation step, runs `render_system` callbacks.
    Render,
}

/// Execution order of systems and render systems.
#[derive(Clone, Debug, Default)]
pub struct Scheduler {
    systems: Vec<String>,
    render_systems: Vec<String>,
}

impl Scheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a component to the orders it participates in.
    pub fn register(&mut self, name: &str, system: bool, render_system: bool) {
        if system {
            self.systems.push(name.to_string());
        }
        if render_system {
            self.render_systems.push(name.to_string());
        }
    }

    /// Removes a component from both orders.
    pub fn unregister(&mut self, name: &str) {
        self.systems.retain(|n| n != name);
        self.render_systems.retain(|n| n != name);
    }

    /// Component names in execution order for a phase.
    #[must_use]
    pub fn order(&self, phase: Phase) -> &[String] {
        match phase {
            Phase::Tick => &self.systems,
            Phase::Render => &self.render_systems,
        }
    }
}
