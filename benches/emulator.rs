use std::collections::BTreeMap;

use binsim::arch::Architecture;
use binsim::config::Endianness;
use binsim::driver::Driver;
use binsim::image::{Section, SectionImage};
use binsim::instruction::Instruction;
use binsim::operand::Operand;
use binsim::register::{ArmRegister, MipsRegister};
use binsim::state::SimulationState;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use sim_value::{Value, Width};

const START: u64 = 0x1000;

fn image() -> SectionImage {
    SectionImage::new([Section::new(".data", 0x400000, vec![0xab; 0x100])])
}

fn mips_state() -> SimulationState {
    SimulationState::new(Architecture::Mips, Endianness::Big, image(), START)
}

fn decode(arch: Architecture, mnemonic: &str, operands: Vec<Operand>) -> Instruction {
    Instruction::decode(arch, mnemonic, operands).expect("failed to decode instruction")
}

fn setup_add() -> (SimulationState, Instruction) {
    let mut state = mips_state();
    state.set_register(MipsRegister::T0.into(), Value::literal(0x1234, Width::W32));
    let instruction = decode(
        Architecture::Mips,
        "addiu",
        vec![
            Operand::register(MipsRegister::T1),
            Operand::register(MipsRegister::T0),
            Operand::imm(0x10),
        ],
    );
    (state, instruction)
}

fn setup_symbolic_or() -> (SimulationState, Instruction) {
    let instruction = decode(
        Architecture::Mips,
        "or",
        vec![
            Operand::register(MipsRegister::V0),
            Operand::register(MipsRegister::A0),
            Operand::register(MipsRegister::Zero),
        ],
    );
    (mips_state(), instruction)
}

fn setup_global_load() -> (SimulationState, Instruction) {
    let mut state = mips_state();
    state.set_register(MipsRegister::T0.into(), Value::literal(0x400000, Width::W32));
    let instruction = decode(
        Architecture::Mips,
        "lw",
        vec![
            Operand::register(MipsRegister::T1),
            Operand::indirect(MipsRegister::T0, 0x40),
        ],
    );
    (state, instruction)
}

fn setup_stack_store() -> (SimulationState, Instruction) {
    let mut state = mips_state();
    state.set_register(MipsRegister::T0.into(), Value::literal(0x55aa, Width::W32));
    let instruction = decode(
        Architecture::Mips,
        "sw",
        vec![
            Operand::register(MipsRegister::T0),
            Operand::indirect(MipsRegister::Sp, -16),
        ],
    );
    (state, instruction)
}

fn setup_push() -> (SimulationState, Instruction) {
    let state = SimulationState::new(Architecture::Arm, Endianness::Little, image(), START);
    let instruction = decode(
        Architecture::Arm,
        "PUSH",
        vec![Operand::register_list([
            ArmRegister::R4,
            ArmRegister::R5,
            ArmRegister::R6,
            ArmRegister::Lr,
        ])],
    );
    (state, instruction)
}

/// A countdown loop: `t0` starts at 100 and the loop exits when it reaches zero.
fn countdown_loop() -> BTreeMap<u64, Instruction> {
    use MipsRegister::*;

    let program = [
        ("addiu", vec![Operand::register(T0), Operand::register(Zero), Operand::imm(100)]),
        ("addiu", vec![Operand::register(T0), Operand::register(T0), Operand::simm(-1)]),
        ("bne", vec![Operand::register(T0), Operand::register(Zero), Operand::absolute(START + 4)]),
        ("nop", vec![]),
    ];

    program
        .into_iter()
        .zip((START..).step_by(4))
        .map(|((mnemonic, operands), address)| {
            (address, decode(Architecture::Mips, mnemonic, operands))
        })
        .collect()
}

fn instructions(c: &mut Criterion) {
    let benches: [(&str, fn() -> (SimulationState, Instruction)); 5] = [
        ("add", setup_add),
        ("symbolic_or", setup_symbolic_or),
        ("global_load", setup_global_load),
        ("stack_store", setup_stack_store),
        ("push", setup_push),
    ];

    for (name, setup) in benches {
        c.bench_function(name, |b| {
            b.iter_batched(
                setup,
                |(mut state, instruction)| {
                    state
                        .step(&instruction)
                        .expect("failed to simulate instruction")
                },
                BatchSize::SmallInput,
            )
        });
    }
}

fn driver(c: &mut Criterion) {
    let program = countdown_loop();
    let driver = Driver::new(1_000);

    c.bench_function("countdown_loop", |b| {
        b.iter_batched(
            mips_state,
            |mut state| driver.run(&mut state, &program),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, instructions, driver);
criterion_main!(benches);
