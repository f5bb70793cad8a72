//! The interactive training loop as a line-fed state machine.

use facetrain_core::PersonName;
use std::io::{self, BufRead, Write};

pub const EXIT_KEYWORD: &str = "exit";

const NAME_PROMPT: &str = "Enter the name of the person to train (or type 'exit' to quit): ";
const METHOD_PROMPT: &str = "Choose input method: (1) Webcam (2) File : ";
const PATH_PROMPT: &str = "Enter the file or folder path: ";
const INVALID_CHOICE: &str = "Invalid choice. Please select 1 or 2.";
const EXIT_MESSAGE: &str = "Exiting training.";

/// A fully specified training job for one person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainRequest {
    Webcam { name: PersonName },
    Path { name: PersonName, path: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum State {
    #[default]
    AwaitingName,
    AwaitingMethod { name: PersonName },
    AwaitingPath { name: PersonName },
}

/// What the driver should do after one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Input accepted; prompt again.
    Continue,
    /// Input refused; report the message and prompt again in the same state.
    Rejected(String),
    Train(TrainRequest),
    Exit,
}

#[derive(Debug, Default)]
pub struct Session {
    state: State,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn prompt(&self) -> &'static str {
        match self.state {
            State::AwaitingName => NAME_PROMPT,
            State::AwaitingMethod { .. } => METHOD_PROMPT,
            State::AwaitingPath { .. } => PATH_PROMPT,
        }
    }

    /// Feed one line of user input.
    pub fn handle(&mut self, line: &str) -> Step {
        let input = line.trim();
        match std::mem::take(&mut self.state) {
            State::AwaitingName => {
                if input.eq_ignore_ascii_case(EXIT_KEYWORD) {
                    return Step::Exit;
                }
                match PersonName::parse(input) {
                    Ok(name) => {
                        self.state = State::AwaitingMethod { name };
                        Step::Continue
                    }
                    Err(e) => Step::Rejected(format!("Invalid name: {e}.")),
                }
            }
            State::AwaitingMethod { name } => match input {
                "1" => Step::Train(TrainRequest::Webcam { name }),
                "2" => {
                    self.state = State::AwaitingPath { name };
                    Step::Continue
                }
                _ => {
                    self.state = State::AwaitingMethod { name };
                    Step::Rejected(INVALID_CHOICE.to_string())
                }
            },
            State::AwaitingPath { name } => Step::Train(TrainRequest::Path {
                name,
                path: input.to_string(),
            }),
        }
    }
}

/// Drive a [`Session`] from `input`, writing prompts and results to `output`.
///
/// `dispatch` runs each training request and returns a one-line summary.
/// End of input behaves like the exit keyword.
pub fn run_session<R, W, F>(mut input: R, mut output: W, mut dispatch: F) -> io::Result<()>
where
    R: BufRead,
    W: Write,
    F: FnMut(TrainRequest) -> String,
{
    let mut session = Session::new();
    let mut line = String::new();

    loop {
        tracing::trace!(state = ?session.state(), "awaiting input");
        write!(output, "{}", session.prompt())?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            writeln!(output, "{EXIT_MESSAGE}")?;
            return Ok(());
        }

        match session.handle(&line) {
            Step::Continue => {}
            Step::Rejected(message) => {
                tracing::debug!(input = %line.trim(), "input rejected");
                writeln!(output, "{message}")?;
            }
            Step::Train(request) => {
                let summary = dispatch(request);
                writeln!(output, "{summary}")?;
            }
            Step::Exit => {
                writeln!(output, "{EXIT_MESSAGE}")?;
                return Ok(());
            }
        }
    }
}
