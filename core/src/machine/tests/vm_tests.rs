use super::helpers::{load, run, TEST_STACK};
use crate::cell::{Cell, CellType, Env};
use crate::error::EvalError;
use crate::runtime::standard_env;

const TOP: usize = TEST_STACK - 1;

#[test]
fn test_push_and_pop_restore_sp() {
    let (mut m, _) = load("main: DATA $7 PUSH DATA $0 POP EXIT", &[]);
    assert_eq!(m.run().unwrap(), Cell::Number(7));
    assert_eq!(m.sp(), TOP);
}

#[test]
fn test_arguments_are_pushed_in_order() {
    let args = [Cell::Number(5), Cell::Number(9)];
    let (m, _) = load("main: EXIT", &args);
    assert_eq!(m.sp(), TOP - 2);
    assert_eq!(m.stack_slot(TOP - 1), Some(&Cell::Number(5)));
    assert_eq!(m.stack_slot(TOP - 2), Some(&Cell::Number(9)));
    assert_eq!(m.pc(), 0);
}

#[test]
fn test_lea_reads_above_bp_after_enter() {
    let args = [Cell::Number(5), Cell::Number(9)];
    assert_eq!(run("main: ENTER 0 LEA 1 EXIT", &args).unwrap(), Cell::Number(9));
    assert_eq!(run("main: ENTER 0 LEA 2 EXIT", &args).unwrap(), Cell::Number(5));
}

#[test]
fn test_sea_writes_locals_below_bp() {
    let source = "main: ENTER 2 DATA $4 SEA -2 DATA $0 LEA -2 EXIT";
    assert_eq!(run(source, &[]).unwrap(), Cell::Number(4));
}

#[test]
fn test_subroutine_call_restores_frame() {
    let source = "
        main:   DATA $4
                PUSH
                JSR double
                ADJ 1
                EXIT
        double: ENTER 0
                LEA 2
                PUSH
                DATA $2
                MUL
                LEAVE
    ";
    let (mut m, _) = load(source, &[]);
    assert_eq!(m.run().unwrap(), Cell::Number(8));
    assert_eq!(m.sp(), TOP);
    assert_eq!(m.bp(), TOP);
}

#[test]
fn test_comparisons_pop_and_keep_variants_do_not() {
    assert_eq!(run("main: DATA $3 PUSH DATA $5 LT EXIT", &[]).unwrap(), Cell::Number(1));
    assert_eq!(run("main: DATA $3 PUSH DATA $5 GT EXIT", &[]).unwrap(), Cell::Number(0));
    assert_eq!(run("main: DATA $5 PUSH DATA $5 LE EXIT", &[]).unwrap(), Cell::Number(1));

    let (mut m, _) = load("main: DATA $3 PUSH DATA $5 LTK EXIT", &[]);
    assert_eq!(m.run().unwrap(), Cell::Number(1));
    assert_eq!(m.sp(), TOP - 1);

    let (mut m, _) = load("main: DATA $3 PUSH DATA $5 LT EXIT", &[]);
    m.run().unwrap();
    assert_eq!(m.sp(), TOP);
}

#[test]
fn test_equality_uses_cell_equality() {
    let source = r#"main: DATA "abc" PUSH DATA "abc" EQ EXIT"#;
    assert_eq!(run(source, &[]).unwrap(), Cell::Number(1));
    let source = r#"main: DATA $1 PUSH DATA "1" NEQ EXIT"#;
    assert_eq!(run(source, &[]).unwrap(), Cell::Number(0));
    let source = "main: DATA Nil PUSH DATA Nil EQK EXIT";
    assert_eq!(run(source, &[]).unwrap(), Cell::Number(1));
}

#[test]
fn test_sub_and_mul_take_left_operand_from_stack() {
    assert_eq!(run("main: DATA $10 PUSH DATA $3 SUB EXIT", &[]).unwrap(), Cell::Number(7));
    assert_eq!(run("main: DATA $6 PUSH DATA $7 MUL EXIT", &[]).unwrap(), Cell::Number(42));
}

#[test]
fn test_branches_follow_integer_view_of_a() {
    let source = "main: DATA False BZ yes DATA $0 EXIT yes: DATA $1 EXIT";
    assert_eq!(run(source, &[]).unwrap(), Cell::Number(1));
    let source = "main: DATA True BNZ yes DATA $0 EXIT yes: DATA $1 EXIT";
    assert_eq!(run(source, &[]).unwrap(), Cell::Number(1));
    let source = "main: DATA $0 BNZ yes DATA $2 EXIT yes: DATA $1 EXIT";
    assert_eq!(run(source, &[]).unwrap(), Cell::Number(2));
}

#[test]
fn test_switch_and_dup() {
    let source = "main: DATA $1 PUSH DATA $2 PUSH SWITCH POP EXIT";
    assert_eq!(run(source, &[]).unwrap(), Cell::Number(1));

    let (mut m, _) = load("main: DATA $5 PUSH DATA $0 DUP POP EXIT", &[]);
    assert_eq!(m.run().unwrap(), Cell::Number(5));
    assert_eq!(m.sp(), TOP - 1);
}

#[test]
fn test_building_a_list() {
    let source = "
        main: DATA $CellType.LIST
              CELLNEW
              PUSH
              DATA $10
              CELLPUSH
              DATA $20
              CELLPUSH
              PEEK
              CELLCOUNT
              PUSH
              DATA $2
              EQ
              BZ fail
              POP
              EXIT
        fail: HALTMSG \"wrong count\"
    ";
    let (mut m, _) = load(source, &[]);
    let list = m.run().unwrap();
    assert_eq!(m.halt_message(), None);
    assert_eq!(list.to_string(), "(10 20)");
}

#[test]
fn test_head_tail_and_index() {
    let list = Cell::list(vec![Cell::Number(1), Cell::Number(2), Cell::Number(3)]);
    let args = [list];
    assert_eq!(run("main: CELLHEAD EXIT", &args).unwrap(), Cell::Number(1));
    assert_eq!(run("main: CELLTAIL EXIT", &args).unwrap().to_string(), "(2 3)");
    assert_eq!(run("main: DATA $2 CELLINDEX EXIT", &args).unwrap(), Cell::Number(3));

    let err = run("main: DATA $3 CELLINDEX EXIT", &args).unwrap_err();
    assert!(matches!(err, EvalError::VmFault(_)), "{:?}", err);
}

#[test]
fn test_cell_type_codes() {
    let args = [Cell::string("s")];
    assert_eq!(
        run("main: DATA $1 CELLTYPE EXIT", &[]).unwrap(),
        Cell::Number(CellType::Number.code())
    );
    assert_eq!(
        run("main: PEEK CELLTYPE EXIT", &args).unwrap(),
        Cell::Number(CellType::String.code())
    );
}

#[test]
fn test_list_becomes_closure_over_env() {
    let form = crate::reader::read("(lambda (x) x)").unwrap();
    let env = Env::new();
    let args = [form, Cell::Env(env.clone())];
    let source = "
        main: ENTER 0
              LEA 2
              PUSH
              DATA $CellType.LAMBDA
              CELLSETTYPE
              LEA 1
              CELLSETENV
              POP
              EXIT
    ";
    let closure = run(source, &args).unwrap();
    assert_eq!(closure.cell_type(), CellType::Lambda);
    assert!(closure.env().unwrap().ptr_eq(&env));
    assert_eq!(closure.to_string(), "#Lambda((x) x)");
}

#[test]
fn test_env_new_binds_variadic_parameters() {
    let parent = Env::new();
    let source = r#"
        main: ENTER 1
              DATA "xs"
              PUSH
              DATA $CellType.SYMBOL
              CELLSETTYPE
              DATA $CellType.LIST
              CELLNEW
              PUSH
              DATA $7
              CELLPUSH
              LEA 1
              ENVNEW
              SEA -1
              DATA "xs"
              PUSH
              LEA -1
              ENVLOOKUP
              EXIT
    "#;
    let value = run(source, &[Cell::Env(parent)]).unwrap();
    assert_eq!(value.to_string(), "(7)");
}

#[test]
fn test_env_define_then_lookup() {
    let env = Env::new();
    let source = r#"
        main: ENTER 0
              LEA 1
              PUSH
              DATA "k"
              PUSH
              DATA $11
              ENVDEFINE
              DATA "k"
              PUSH
              LEA 1
              ENVLOOKUP
              EXIT
    "#;
    assert_eq!(run(source, &[Cell::Env(env.clone())]).unwrap(), Cell::Number(11));
    assert_eq!(env.lookup("k").unwrap(), Cell::Number(11));
}

#[test]
fn test_env_set_requires_existing_binding() {
    let source = r#"main: ENTER 0 LEA 1 PUSH DATA "k" PUSH DATA $1 ENVSET EXIT"#;
    let err = run(source, &[Cell::Env(Env::new())]).unwrap_err();
    assert_eq!(err, EvalError::SetOnUndefined("k".into()));
}

#[test]
fn test_invoke_native_procedure() {
    let env = standard_env();
    let source = r#"
        main: ENTER 0
              LEA 1
              PUSH
              DATA $CellType.LIST
              CELLNEW
              PUSH
              DATA $2
              CELLPUSH
              DATA $3
              CELLPUSH
              DATA "+"
              PUSH
              LEA 1
              ENVLOOKUP
              CELLINVOKE
              EXIT
    "#;
    assert_eq!(run(source, &[Cell::Env(env)]).unwrap(), Cell::Number(5));
}

#[test]
fn test_invoke_non_procedure_fails() {
    let source = "main: ENTER 0 LEA 1 PUSH DATA Nil PUSH DATA $9 CELLINVOKE EXIT";
    let err = run(source, &[Cell::Env(Env::new())]).unwrap_err();
    assert_eq!(err, EvalError::NotCallable("9".into()));
}

#[test]
fn test_print_and_halt_write_output() {
    let (mut m, out) = load(r#"main: DATA "hi" PRINT DATA NewLine PRINT HALTMSG "bye""#, &[]);
    m.run().unwrap();
    assert!(m.is_finished());
    assert_eq!(m.halt_message(), Some("bye"));
    assert_eq!(out.text(), "hi\nbye\n");
}

#[test]
fn test_state_dumps_registers() {
    let (mut m, out) = load("main: STATE EXIT", &[]);
    m.run().unwrap();
    assert!(out.text().starts_with("PC=1 SP=63 BP=63"), "{}", out.text());
}

#[test]
fn test_step_after_exit_reports_missing_opcode() {
    let (mut m, _) = load("main: EXIT", &[]);
    m.run().unwrap();
    assert_eq!(m.step(), Err(EvalError::MissingOpcode { word: -1, pc: 1 }));
}

#[test]
fn test_undefined_opcode_word() {
    assert_eq!(
        run("main: 999", &[]),
        Err(EvalError::MissingOpcode { word: 999, pc: 0 })
    );
}

#[test]
fn test_stack_overflow_faults() {
    let err = run("main: PUSH JMP main", &[]).unwrap_err();
    assert!(matches!(err, EvalError::VmFault(ref msg) if msg.contains("overflow")), "{:?}", err);
}

#[test]
fn test_out_of_range_accesses_fault() {
    assert!(matches!(run("main: LEA 100", &[]), Err(EvalError::VmFault(_))));
    assert!(matches!(run("main: DATA 5", &[]), Err(EvalError::VmFault(_))));
    assert!(matches!(run("main: JMP 500", &[]), Err(EvalError::VmFault(_))));
    assert!(matches!(run("main: POP POP", &[]), Err(EvalError::VmFault(_))));
}

#[test]
fn test_run_for_respects_budget() {
    let (mut m, _) = load("main: NOP NOP NOP EXIT", &[]);
    assert!(!m.run_for(2).unwrap());
    assert_eq!(m.steps(), 2);
    assert!(m.run_for(10).unwrap());
    assert_eq!(m.steps(), 4);
}
