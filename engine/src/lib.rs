//! Deterministic rules for the block-fit puzzle plus the headless runner
//! used to step, rewind and replay sessions.

pub mod agent;
pub mod error;
pub mod generator;
pub mod grid;
pub mod items;
pub mod ledger;
pub mod milestones;
pub mod piece;
pub mod placement;
pub mod progression;
pub mod replay;
pub mod rng;

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Every state a session has passed through, with a cursor marking the one
/// currently shown. Recording while rewound forks the session: states past
/// the cursor are discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeMachine<State> {
    states: Vec<State>,
    frame: usize,
}

impl<State> TimeMachine<State> {
    pub fn new(initial_state: State) -> Self {
        Self {
            states: vec![initial_state],
            frame: 0,
        }
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    fn last_frame(&self) -> usize {
        self.states.len().saturating_sub(1)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state(&self) -> &State {
        &self.states[self.frame]
    }

    pub fn history(&self) -> &[State] {
        &self.states
    }

    pub fn can_rewind(&self) -> bool {
        self.frame != 0
    }

    pub fn can_forward(&self) -> bool {
        self.frame < self.last_frame()
    }

    pub fn rewind(&mut self, frames: usize) -> usize {
        self.seek(self.frame.saturating_sub(frames))
    }

    pub fn forward(&mut self, frames: usize) -> usize {
        self.seek(self.frame.saturating_add(frames))
    }

    /// Moves the cursor to `frame`, clamped to the recorded history.
    pub fn seek(&mut self, frame: usize) -> usize {
        self.frame = frame.min(self.last_frame());
        self.frame
    }

    /// Appends `state` after the cursor and returns its frame.
    pub fn record(&mut self, state: State) -> usize {
        self.states.truncate(self.frame + 1);
        self.states.push(state);
        self.frame = self.last_frame();
        self.frame
    }

    fn check_cursor(&self, origin: &Path) -> io::Result<()> {
        if self.frame < self.states.len() {
            return Ok(());
        }
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "session history {} holds {} state(s) but its cursor is at frame {}",
                origin.display(),
                self.states.len(),
                self.frame
            ),
        ))
    }
}

impl<State: Serialize> TimeMachine<State> {
    /// Writes the whole history as pretty JSON, creating parent directories.
    pub fn save_json_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let mut out = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut out, self).map_err(io::Error::from)?;
        out.flush()
    }
}

impl<State: DeserializeOwned> TimeMachine<State> {
    pub fn load_json_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let history: Self = serde_json::from_slice(&bytes).map_err(|err| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("session history {} is not valid json: {err}", path.display()),
            )
        })?;
        history.check_cursor(path)?;
        Ok(history)
    }
}

/// Pure transition function driven by the runner. `step` never mutates the
/// input state, which is what makes rewind and replay exact.
pub trait GameLogic {
    type State;
    type Input;

    fn initial_state(&self) -> Self::State;
    fn step(&self, state: &Self::State, input: Self::Input) -> Self::State;
}

/// Drives a [`GameLogic`] without any window or clock, recording each
/// resulting state in a [`TimeMachine`].
#[derive(Debug)]
pub struct HeadlessRunner<G: GameLogic> {
    game: G,
    timemachine: TimeMachine<G::State>,
}

impl<G: GameLogic> HeadlessRunner<G> {
    pub fn new(game: G) -> Self {
        let timemachine = TimeMachine::new(game.initial_state());
        Self { game, timemachine }
    }

    /// Resumes from a previously recorded history.
    pub fn with_timemachine(game: G, timemachine: TimeMachine<G::State>) -> Self {
        Self { game, timemachine }
    }

    pub fn frame(&self) -> usize {
        self.timemachine.frame()
    }

    pub fn state(&self) -> &G::State {
        self.timemachine.state()
    }

    pub fn history(&self) -> &[G::State] {
        self.timemachine.history()
    }

    pub fn timemachine(&self) -> &TimeMachine<G::State> {
        &self.timemachine
    }

    pub fn step(&mut self, input: G::Input) -> usize {
        let next = self.game.step(self.state(), input);
        let frame = self.timemachine.record(next);
        log::trace!("recorded frame {frame}");
        frame
    }

    /// Steps through every input and returns the final frame.
    pub fn run<I>(&mut self, inputs: I) -> usize
    where
        I: IntoIterator<Item = G::Input>,
    {
        inputs
            .into_iter()
            .fold(self.frame(), |_, input| self.step(input))
    }

    pub fn rewind(&mut self, frames: usize) -> usize {
        self.timemachine.rewind(frames)
    }

    pub fn forward(&mut self, frames: usize) -> usize {
        self.timemachine.forward(frames)
    }

    pub fn seek(&mut self, frame: usize) -> usize {
        self.timemachine.seek(frame)
    }
}
