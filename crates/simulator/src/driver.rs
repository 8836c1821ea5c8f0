use std::collections::BTreeMap;

use crate::config::SimulatorConfig;
use crate::error::ErrorClass;
use crate::instruction::Instruction;
use crate::state::SimulationState;

/// Lookup of decoded instructions by address.
pub trait InstructionSource {
    fn instruction_at(&self, address: u64) -> Option<&Instruction>;
}

impl InstructionSource for BTreeMap<u64, Instruction> {
    fn instruction_at(&self, address: u64) -> Option<&Instruction> {
        self.get(&address)
    }
}

/// Reason a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// No instruction is known at the program counter.
    MissingInstruction(u64),

    /// The configured number of steps was executed.
    StepLimit,

    /// An instruction failed with an error that leaves the next address unknown.
    Fatal {
        iaddr: u64,
        class: ErrorClass,
        message: String,
    },
}

/// Failure of a single instruction that did not end the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub iaddr: u64,
    pub class: ErrorClass,
    pub message: String,
}

/// Outcome of [Driver::run].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    /// Number of instructions attempted, including those that failed.
    pub steps: usize,

    /// Trace line of every instruction that completed, by instruction address.
    pub traces: Vec<(u64, String)>,

    pub failures: Vec<Failure>,

    pub stop: StopReason,
}

/// Steps instructions in program counter order until the program leaves the known code, the
/// step limit is reached, or a fatal error occurs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Driver {
    max_steps: usize,
}

impl Driver {
    pub fn new(max_steps: usize) -> Self {
        Self { max_steps }
    }

    pub fn from_config(config: &SimulatorConfig) -> Self {
        Self::new(config.max_steps)
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn run(&self, state: &mut SimulationState, source: &impl InstructionSource) -> RunReport {
        let mut traces = Vec::new();
        let mut failures = Vec::new();

        for steps in 0..self.max_steps {
            let iaddr = state.program_counter();
            let Some(instruction) = source.instruction_at(iaddr) else {
                tracing::debug!(iaddr, "no instruction at program counter");
                return RunReport {
                    steps,
                    traces,
                    failures,
                    stop: StopReason::MissingInstruction(iaddr),
                };
            };

            match state.step(instruction) {
                Ok(trace) => {
                    tracing::trace!(iaddr, %instruction, %trace);
                    traces.push((iaddr, trace));
                }
                Err(err) => {
                    let class = err.class();
                    if class.is_fatal() {
                        tracing::error!(iaddr, %instruction, %class, "{err}");
                        return RunReport {
                            steps: steps + 1,
                            traces,
                            failures,
                            stop: StopReason::Fatal {
                                iaddr,
                                class,
                                message: err.to_string(),
                            },
                        };
                    }

                    tracing::warn!(iaddr, %instruction, %class, "{err}");
                    failures.push(Failure {
                        iaddr,
                        class,
                        message: err.to_string(),
                    });
                    state.increment_program_counter(instruction.length());
                }
            }
        }

        RunReport {
            steps: self.max_steps,
            traces,
            failures,
            stop: StopReason::StepLimit,
        }
    }
}
