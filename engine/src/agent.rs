//! Command-driven wrapper around [`HeadlessRunner`] for tools and bridges.
//!
//! A host owns one session. Commands either advance it, move the cursor, or
//! query it; every command answers with the state under the cursor unless it
//! asks for something else.

use serde::Serialize;

use crate::replay::state_sha256_hex;
use crate::{GameLogic, HeadlessRunner};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCommand<I> {
    Step(I),
    Reset,
    GetState,
    GetHistory,
    Rewind { frames: usize },
    Forward { frames: usize },
    Seek { frame: usize },
    Digest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentResponse<S> {
    State { frame: usize, state: S },
    History { frame: usize, history: Vec<S> },
    Digest { frame: usize, sha256: String },
}

pub struct AgentHost<G>
where
    G: GameLogic + Clone,
{
    logic: G,
    runner: HeadlessRunner<G>,
}

impl<G> AgentHost<G>
where
    G: GameLogic + Clone,
    G::State: Clone + Serialize,
{
    pub fn new(logic: G) -> Self {
        Self {
            runner: HeadlessRunner::new(logic.clone()),
            logic,
        }
    }

    pub fn handle(&mut self, command: AgentCommand<G::Input>) -> AgentResponse<G::State> {
        match command {
            AgentCommand::Step(input) => {
                self.runner.step(input);
            }
            AgentCommand::Reset => {
                log::debug!("session reset after {} frame(s)", self.runner.history().len());
                self.runner = HeadlessRunner::new(self.logic.clone());
            }
            AgentCommand::GetState => {}
            AgentCommand::Rewind { frames } => {
                self.runner.rewind(frames);
            }
            AgentCommand::Forward { frames } => {
                self.runner.forward(frames);
            }
            AgentCommand::Seek { frame } => {
                self.runner.seek(frame);
            }
            AgentCommand::GetHistory => return self.history_response(),
            AgentCommand::Digest => return self.digest_response(),
        }
        AgentResponse::State {
            frame: self.runner.frame(),
            state: self.runner.state().clone(),
        }
    }

    fn history_response(&self) -> AgentResponse<G::State> {
        AgentResponse::History {
            frame: self.runner.frame(),
            history: self.runner.history().to_vec(),
        }
    }

    fn digest_response(&self) -> AgentResponse<G::State> {
        AgentResponse::Digest {
            frame: self.runner.frame(),
            sha256: state_sha256_hex(self.runner.state()),
        }
    }

    pub fn runner(&self) -> &HeadlessRunner<G> {
        &self.runner
    }
}
