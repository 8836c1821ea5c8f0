use sim_value::{Address, Value, Width};

use crate::arch::Architecture;
use crate::error::{Error, ErrorClass, Result, Unresolved};
use crate::instruction::{InstrXData, Instruction};
use crate::operand::Operand;
use crate::register::MipsRegister::{self, *};
use crate::test_fixture::{self, mips, step, START};

fn reg(register: MipsRegister) -> Operand {
    Operand::register(register)
}

fn decode(mnemonic: &str, operands: Vec<Operand>) -> Result<Instruction> {
    Instruction::decode(Architecture::Mips, mnemonic, operands)
}

#[test]
fn add_immediate_to_symbol() -> Result<()> {
    let mut state = test_fixture::state(Architecture::Mips);
    let program = test_fixture::program(
        Architecture::Mips,
        [("addiu", vec![reg(V0), reg(A0), Operand::imm(1)])],
    )?;

    assert_eq!(step(&mut state, &program)?, "v0 := a0_in + 0x1");
    assert_eq!(state.program_counter(), START + 4);
    Ok(())
}

#[test]
fn or_with_unknown_input() -> Result<()> {
    let mut state = test_fixture::state(Architecture::Mips);
    state.set_register(mips(A0), Value::symbol("unknown_input", Width::W32));
    state.set_register(mips(A1), Value::literal(1, Width::W32));
    let program = test_fixture::program(
        Architecture::Mips,
        [("or", vec![reg(V0), reg(A0), reg(A1)])],
    )?;

    assert_eq!(step(&mut state, &program)?, "v0 := unknown_input | 0x1");
    assert_eq!(
        state.register_value(mips(V0)),
        Value::symbol("unknown_input | 0x1", Width::W32)
    );
    Ok(())
}

#[test]
fn two_unknowns_produce_expression_symbol() -> Result<()> {
    let mut state = test_fixture::state(Architecture::Mips);
    let program = test_fixture::program(
        Architecture::Mips,
        [("xor", vec![reg(V0), reg(A0), reg(A1)])],
    )?;

    assert_eq!(step(&mut state, &program)?, "v0 := a0_in ^ a1_in");
    Ok(())
}

#[test]
fn load_upper_and_load_word() -> Result<()> {
    let mut state = test_fixture::state(Architecture::Mips);
    let program = test_fixture::program(
        Architecture::Mips,
        [
            ("lui", vec![reg(T0), Operand::imm(0x40)]),
            ("lw", vec![reg(T1), Operand::indirect(T0, 0x100)]),
        ],
    )?;

    assert_eq!(step(&mut state, &program)?, "t0 := 0x400000");
    assert_eq!(step(&mut state, &program)?, "t1 := 0x112233");
    Ok(())
}

#[test]
fn store_byte_and_word() -> Result<()> {
    let mut state = test_fixture::state(Architecture::Mips);
    state.set_register(mips(T0), Value::literal(0x11223344, Width::W32));
    let program = test_fixture::program(
        Architecture::Mips,
        [
            ("sw", vec![reg(T0), Operand::indirect(Sp, -8)]),
            ("sb", vec![reg(T0), Operand::indirect(Sp, -12)]),
            ("lw", vec![reg(T1), Operand::indirect(Sp, -8)]),
        ],
    )?;

    assert_eq!(step(&mut state, &program)?, "[stack:-0x8] := 0x11223344");
    assert_eq!(step(&mut state, &program)?, "[stack:-0xc] := 0x44");
    assert_eq!(step(&mut state, &program)?, "t1 := 0x11223344");
    Ok(())
}

#[test]
fn shift_left_variable_masks_amount() -> Result<()> {
    let mut state = test_fixture::state(Architecture::Mips);
    state.set_register(mips(T0), Value::literal(3, Width::W32));
    state.set_register(mips(T1), Value::literal(33, Width::W32));
    let program = test_fixture::program(
        Architecture::Mips,
        [("sllv", vec![reg(V0), reg(T0), reg(T1)])],
    )?;

    assert_eq!(step(&mut state, &program)?, "v0 := 0x6");
    Ok(())
}

#[test]
fn shift_left_by_unknown_amount_escalates() -> Result<()> {
    let mut state = test_fixture::state(Architecture::Mips);
    let program = test_fixture::program(
        Architecture::Mips,
        [("sllv", vec![reg(V0), reg(T0), reg(A0)])],
    )?;

    let err = step(&mut state, &program).expect_err("shift amount is symbolic");
    assert!(matches!(err, Error::SymbolicEscalation { .. }));
    assert!(!err.class().is_fatal());
    assert_eq!(state.program_counter(), START);
    Ok(())
}

#[test]
fn set_less_than_unsigned() -> Result<()> {
    let mut state = test_fixture::state(Architecture::Mips);
    state.set_register(mips(T0), Value::literal(3, Width::W32));
    let program = test_fixture::program(
        Architecture::Mips,
        [
            ("sltiu", vec![reg(V0), reg(T0), Operand::imm(0x10)]),
            ("sltiu", vec![reg(V1), reg(A0), Operand::imm(0x10)]),
        ],
    )?;

    assert_eq!(step(&mut state, &program)?, "v0 := 0x1");
    assert_eq!(step(&mut state, &program)?, "v1 := a0_in < 0x10");
    Ok(())
}

#[test]
fn trap_if_equal() -> Result<()> {
    let mut state = test_fixture::state(Architecture::Mips);
    let program = test_fixture::program(
        Architecture::Mips,
        [
            ("teq", vec![reg(Zero), reg(T0)]),
            ("teq", vec![reg(Zero), reg(Zero)]),
        ],
    )?;

    state.set_register(mips(T0), Value::literal(4, Width::W32));
    assert_eq!(step(&mut state, &program)?, "trap if equal: 0x0, 0x4");

    let err = step(&mut state, &program).expect_err("equal operands trap");
    assert!(matches!(err, Error::Trap { iaddr: 0x1004, .. }));
    assert!(err.class().is_fatal());
    Ok(())
}

#[test]
fn trap_on_unknown_operand_escalates() -> Result<()> {
    let mut state = test_fixture::state(Architecture::Mips);
    let program = test_fixture::program(Architecture::Mips, [("teq", vec![reg(A0), reg(Zero)])])?;

    let err = step(&mut state, &program).expect_err("operand is symbolic");
    assert_eq!(err.class(), ErrorClass::SymbolicEscalation);
    Ok(())
}

#[test]
fn branch_equal_has_delay_slot() -> Result<()> {
    let mut state = test_fixture::state(Architecture::Mips);
    let sp = state.register_value(mips(Sp));
    state.set_register(mips(T0), sp.clone());
    state.set_register(mips(T1), sp);

    let mut program = test_fixture::program(
        Architecture::Mips,
        [
            ("beq", vec![reg(T0), reg(T1), Operand::absolute(0x2000)]),
            ("addiu", vec![reg(V0), reg(Zero), Operand::imm(7)]),
        ],
    )?;
    program.insert(0x2000, decode("nop", vec![])?);

    assert_eq!(
        step(&mut state, &program)?,
        "if stack:0x0 == stack:0x0 then goto 0x2000 else goto 0x1008 (taken)"
    );
    assert_eq!(state.program_counter(), START + 4);
    assert_eq!(state.delayed_program_counter(), Some(0x2000));

    assert_eq!(step(&mut state, &program)?, "v0 := 0x7");
    assert_eq!(state.program_counter(), 0x2000);
    Ok(())
}

#[test]
fn branch_not_taken_skips_delay_slot_afterwards() -> Result<()> {
    let mut state = test_fixture::state(Architecture::Mips);
    state.set_register(mips(T0), Value::literal(1, Width::W32));
    let program = test_fixture::program(
        Architecture::Mips,
        [
            ("beq", vec![reg(T0), reg(Zero), Operand::absolute(0x2000)]),
            ("nop", vec![]),
            ("nop", vec![]),
        ],
    )?;

    assert_eq!(
        step(&mut state, &program)?,
        "if 0x1 == 0x0 then goto 0x2000 else goto 0x1008 (not taken)"
    );
    step(&mut state, &program)?;
    assert_eq!(state.program_counter(), START + 8);
    Ok(())
}

#[test]
fn string_address_is_not_equal_to_literal() -> Result<()> {
    let mut state = test_fixture::state(Architecture::Mips);
    state.set_register(mips(T0), Value::Address(Address::constant_string("abc")));
    state.set_register(mips(T1), Value::literal(5, Width::W32));
    let program = test_fixture::program(
        Architecture::Mips,
        [("bne", vec![reg(T0), reg(T1), Operand::absolute(0x2000)])],
    )?;

    let trace = step(&mut state, &program)?;
    assert!(trace.ends_with("(taken)"), "{trace}");
    assert_eq!(state.delayed_program_counter(), Some(0x2000));
    Ok(())
}

#[test]
fn file_pointer_against_null() -> Result<()> {
    let mut state = test_fixture::state(Architecture::Mips);
    state.set_register(mips(V0), Value::Address(Address::file("fopen_1")));
    let program = test_fixture::program(
        Architecture::Mips,
        [("beq", vec![reg(V0), reg(Zero), Operand::absolute(0x2000)])],
    )?;

    let trace = step(&mut state, &program)?;
    assert!(trace.ends_with("(not taken)"), "{trace}");
    Ok(())
}

#[test]
fn file_pointer_against_number_is_not_applicable() -> Result<()> {
    let mut state = test_fixture::state(Architecture::Mips);
    state.set_register(mips(V0), Value::Address(Address::file("fopen_1")));
    state.set_register(mips(T0), Value::literal(3, Width::W32));
    let program = test_fixture::program(
        Architecture::Mips,
        [("beq", vec![reg(V0), reg(T0), Operand::absolute(0x2000)])],
    )?;

    let err = step(&mut state, &program).expect_err("comparison is meaningless");
    assert!(matches!(
        err,
        Error::UnresolvableBranch {
            reason: Unresolved::NotApplicable,
            ..
        }
    ));
    Ok(())
}

#[test]
fn branch_on_unknown_is_fatal() -> Result<()> {
    let mut state = test_fixture::state(Architecture::Mips);
    let program = test_fixture::program(
        Architecture::Mips,
        [("bne", vec![reg(A0), reg(Zero), Operand::absolute(0x2000)])],
    )?;

    let err = step(&mut state, &program).expect_err("argument is unknown");
    assert!(matches!(
        err,
        Error::UnresolvableBranch {
            reason: Unresolved::Unknown,
            ..
        }
    ));
    assert!(err.class().is_fatal());
    Ok(())
}

#[test]
fn branch_likely_not_taken_annuls_delay_slot() -> Result<()> {
    let mut state = test_fixture::state(Architecture::Mips);
    state.set_register(mips(T0), Value::literal(0xffff_ffff, Width::W32));
    let program = test_fixture::program(
        Architecture::Mips,
        [("bgezl", vec![reg(T0), Operand::absolute(0x2000)])],
    )?;

    assert_eq!(
        step(&mut state, &program)?,
        "if 0xffffffff >= 0 then goto 0x2000 else goto 0x1008 (not taken)"
    );
    assert_eq!(state.program_counter(), START + 8);
    assert_eq!(state.delayed_program_counter(), None);
    Ok(())
}

#[test]
fn branch_likely_taken() -> Result<()> {
    let mut state = test_fixture::state(Architecture::Mips);
    state.set_register(mips(T0), Value::literal(0xffff_ffff, Width::W32));
    let program = test_fixture::program(
        Architecture::Mips,
        [("bltzl", vec![reg(T0), Operand::absolute(0x2000)])],
    )?;

    step(&mut state, &program)?;
    assert_eq!(state.program_counter(), START + 4);
    assert_eq!(state.delayed_program_counter(), Some(0x2000));
    Ok(())
}

#[test]
fn jump_register() -> Result<()> {
    let mut state = test_fixture::state(Architecture::Mips);
    state.set_register(mips(T9), Value::literal(0x3000, Width::W32));
    let program = test_fixture::program(
        Architecture::Mips,
        [("jr", vec![reg(T9)]), ("jr", vec![reg(Ra)])],
    )?;

    assert_eq!(step(&mut state, &program)?, "goto 0x3000");
    assert_eq!(state.delayed_program_counter(), Some(0x3000));

    // The caller's return address is not known
    let err = step(&mut state, &program).expect_err("return address is symbolic");
    assert_eq!(err.class(), ErrorClass::UnresolvableBranch);
    Ok(())
}

#[test]
fn load_word_right_little_endian() -> Result<()> {
    let mut state = test_fixture::state(Architecture::Mips);
    state.set_register(mips(T0), Value::literal(0x44332211, Width::W32));
    state.set_register(mips(T1), Value::literal(0xaabbccdd, Width::W32));
    let program = test_fixture::program(
        Architecture::Mips,
        [
            ("sw", vec![reg(T0), Operand::indirect(Sp, -8)]),
            ("lwr", vec![reg(T1), Operand::indirect(Sp, -7)]),
            ("lwr", vec![reg(T2), Operand::indirect(Sp, -8)]),
        ],
    )?;

    step(&mut state, &program)?;
    assert_eq!(step(&mut state, &program)?, "t1 := 0xaa001122");
    assert_eq!(state.diagnostics().by_category("stack memory").count(), 1);
    assert_eq!(step(&mut state, &program)?, "t2 := 0x44332211");
    Ok(())
}

#[test]
fn load_word_right_big_endian() -> Result<()> {
    let mut state = test_fixture::big_endian_state(Architecture::Mips);
    state.set_register(mips(T0), Value::literal(0x11223344, Width::W32));
    state.set_register(mips(T1), Value::literal(0xaabbccdd, Width::W32));
    let program = test_fixture::program(
        Architecture::Mips,
        [
            ("sw", vec![reg(T0), Operand::indirect(Sp, -8)]),
            ("lwr", vec![reg(T1), Operand::indirect(Sp, -7)]),
        ],
    )?;

    step(&mut state, &program)?;
    assert_eq!(step(&mut state, &program)?, "t1 := 0xaabb1122");
    Ok(())
}

#[test]
fn load_word_right_unknown_register() -> Result<()> {
    let mut state = test_fixture::state(Architecture::Mips);
    let program = test_fixture::program(
        Architecture::Mips,
        [("lwr", vec![reg(T1), Operand::indirect(Sp, -6)])],
    )?;

    assert_eq!(
        step(&mut state, &program)?,
        "t1 := lwr(t1_in, stack:-0x6)"
    );
    Ok(())
}

#[test]
fn syscall_is_not_simulatable() -> Result<()> {
    let mut state = test_fixture::state(Architecture::Mips);
    let program = test_fixture::program(Architecture::Mips, [("syscall", vec![])])?;
    assert!(!program[&START].is_simulatable());

    let err = step(&mut state, &program).expect_err("syscall has no semantics");
    assert!(matches!(err, Error::NotSimulatable { iaddr: START, .. }));
    assert!(!err.class().is_fatal());
    Ok(())
}

#[test]
fn arithmetic_annotation() -> Result<()> {
    let instruction = decode("addu", vec![reg(V0), reg(A0), reg(A1)])?;

    let same = InstrXData::new(["v0"], ["a0", "a1", "a0 + a1", "a0 + a1"], [1, 2, 3, 4, 4]);
    assert_eq!(instruction.annotation(&same)?, "v0 := a0 + a1");

    let simplified = InstrXData::new(["v0"], ["a0", "a1", "a0 + a1", "a0 + 0x4"], [1, 2, 3, 4, 5]);
    assert_eq!(instruction.annotation(&simplified)?, "v0 := a0 + a1 (= a0 + 0x4)");
    Ok(())
}

#[test]
fn branch_annotation() -> Result<()> {
    let instruction = decode("beq", vec![reg(A0), reg(A1), Operand::absolute(0x2000)])?;
    let xdata = InstrXData::new(
        Vec::<String>::new(),
        ["a0", "a1", "a0 == a1", "a0 == 0x0"],
        [],
    );
    assert_eq!(
        instruction.annotation(&xdata)?,
        "if a0 == a1 (= a0 == 0x0) then goto 0x2000"
    );
    Ok(())
}

#[test]
fn return_annotation() -> Result<()> {
    let xdata = InstrXData::new(Vec::<String>::new(), ["t9"], []);
    assert_eq!(decode("jr", vec![reg(Ra)])?.annotation(&xdata)?, "return");
    assert_eq!(decode("jr", vec![reg(T9)])?.annotation(&xdata)?, "goto t9");
    Ok(())
}

#[test]
fn missing_annotation_data() -> Result<()> {
    let instruction = decode("lw", vec![reg(V0), Operand::indirect(Sp, 4)])?;
    let err = instruction
        .annotation(&InstrXData::new(["v0"], Vec::<String>::new(), []))
        .expect_err("no expressions recorded");
    assert!(matches!(
        err,
        Error::MissingAnnotationData {
            field: "xprs",
            index: 0,
            ..
        }
    ));
    Ok(())
}
