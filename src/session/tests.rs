use super::*;
use crate::backend::CollectedSolution;
use crate::backend::test_helpers::{
    INFEASIBLE, LinearPolicy, Recorder, RichPolicy, Script, ScriptedBackend, TIME_LIMIT,
};
use crate::backend::{IisReport, IisStatus};
use crate::model::{Expr, OptimizationSense, VariableType};

fn isolated() -> SessionConfig {
    SessionConfig::default().with_interrupter(Interrupter::new())
}

fn scripted(script: Script) -> (ScriptedBackend<LinearPolicy>, Recorder) {
    ScriptedBackend::new(script)
}

/// min x, x in [0, 10]
fn bounded_model() -> Model {
    let mut model = Model::new();
    let x = model.add_variable(VariableType::Continuous, 0.0, 10.0);
    model.add_objective(Objective::new(OptimizationSense::Minimize, x));
    model
}

#[test]
fn run_reports_an_optimal_solution() {
    let (backend, recorder) = scripted(Script {
        primal: vec![0.0],
        dual: vec![],
        iterations: 1,
        ..Script::default()
    });
    let mut sink = CollectedSolution::new();
    let report = Session::with_config(backend, &mut sink, isolated())
        .unwrap()
        .run(&bounded_model())
        .unwrap();

    assert_eq!(report.status, SolveStatus::Optimal);
    assert_eq!(report.message, "scripted 1.0: optimal solution\n1 iterations, objective 0\n");
    assert_eq!(report.primal.as_deref(), Some(&[0.0][..]));
    assert_eq!(report.dual, None);
    assert_eq!(sink.solve_code, Some(0));
    assert_eq!(sink.objective_value, Some(0.0));
    assert_eq!(sink.output, "");

    assert_eq!(
        recorder.calls(),
        vec![
            "open",
            "init_modification",
            "add_variable",
            "add_linear_objective 1",
            "finish_modification",
            "set_interrupter",
            "solve",
            "close",
        ]
    );
    assert_eq!(recorder.closes(), 1);
}

#[test]
fn dual_values_are_reported_for_continuous_problems_only() {
    let script = Script {
        primal: vec![1.0],
        dual: vec![0.5],
        ..Script::default()
    };

    let (backend, _) = scripted(script.clone());
    let mut lp = bounded_model();
    lp.add_constraint(Constraint::ge(Expr::var(VarId::new(0)), 1.0));
    let report = Session::with_config(backend, CollectedSolution::new(), isolated())
        .unwrap()
        .run(&lp)
        .unwrap();
    assert_eq!(report.dual, Some(vec![0.5]));

    let (backend, _) = scripted(Script { nodes: 3, ..script });
    let mut mip = Model::new();
    let n = mip.add_variable(VariableType::Integer, 0.0, 5.0);
    mip.add_objective(Objective::new(OptimizationSense::Maximize, n));
    let report = Session::with_config(backend, CollectedSolution::new(), isolated())
        .unwrap()
        .run(&mip)
        .unwrap();
    assert_eq!(report.dual, None);
    assert!(report.message.ends_with("0 iterations, 3 nodes, objective 0\n"));
}

#[test]
fn operations_out_of_order_are_lifecycle_violations() {
    let (backend, _) = scripted(Script::default());
    let mut session = Session::with_config(backend, CollectedSolution::new(), isolated()).unwrap();

    let err = session.solve().unwrap_err();
    assert_eq!(err.code(), "LIFECYCLE_VIOLATION");
    assert_eq!(err.to_string(), "scripted 1.0: cannot solve in state Created");

    session.open().unwrap();
    assert!(matches!(
        session.open(),
        Err(ConvertError::LifecycleViolation { state: "ModificationOpen", operation: "open", .. })
    ));
    assert!(session.report().is_err());

    session.finish_modification().unwrap();
    let err = session
        .add_variable(&Variable::continuous(0.0, 1.0))
        .unwrap_err();
    assert!(matches!(
        err,
        ConvertError::LifecycleViolation { state: "ModificationClosed", operation: "add variable", .. }
    ));

    session.close().unwrap();
    assert_eq!(session.state(), LifecycleState::Closed);
    assert!(session.close().is_err());
    assert!(session.set_option("timing", 1_i64).is_err());
}

#[test]
fn unsupported_constraint_aborts_the_modification_phase() {
    let (backend, recorder) = scripted(Script::default());
    let mut session = Session::with_config(backend, CollectedSolution::new(), isolated()).unwrap();
    session.open().unwrap();

    let x = session.add_variable(&Variable::continuous(0.0, 10.0)).unwrap();
    let y = session.add_variable(&Variable::continuous(0.0, 10.0)).unwrap();
    let r = session.add_variable(&Variable::continuous(0.0, 10.0)).unwrap();

    let err = session
        .add_constraint(0, &Constraint::defining(r, Expr::max([x, y])))
        .unwrap_err();
    assert_eq!(err.to_string(), "scripted 1.0: constraint #0 of kind Max is not supported");
    assert!(session.is_aborted());

    let err = session
        .add_variable(&Variable::continuous(0.0, 1.0))
        .unwrap_err();
    assert_eq!(err.code(), "MODIFICATION_ABORTED");
    assert_eq!(session.finish_modification().unwrap_err().code(), "MODIFICATION_ABORTED");
    assert_eq!(recorder.count("add_variable"), 3);

    drop(session);
    assert_eq!(recorder.closes(), 1);
}

#[test]
fn native_add_failure_aborts_too() {
    let (backend, _) = scripted(Script {
        reject_variables: true,
        ..Script::default()
    });
    let mut sink = CollectedSolution::new();
    let err = Session::with_config(backend, &mut sink, isolated())
        .unwrap()
        .run(&bounded_model())
        .unwrap_err();

    assert!(matches!(
        err,
        ConvertError::NativeFailure { operation: "add variable", ref message, .. } if message == "variable rejected"
    ));
    assert_eq!(sink.solve_code, None);
}

#[test]
fn permissive_mode_skips_unsupported_elements() {
    let (backend, recorder) = scripted(Script::default());
    let config = isolated().with_permissive(true);
    let mut session = Session::with_config(backend, CollectedSolution::new(), config).unwrap();

    let mut model = bounded_model();
    let x = VarId::new(0);
    let y = model.add_variable(VariableType::Continuous, 0.0, 1.0);
    model.add_objective(Objective::new(OptimizationSense::Minimize, x * y));
    model.add_constraint(Constraint::le(Expr::sin(x), 0.5));

    session.open().unwrap();
    session.load_model(&model).unwrap();
    session.finish_modification().unwrap();

    assert_eq!(
        session.skipped(),
        &[
            (Element::Objective(1), Kind::Quadratic),
            (Element::Constraint(0), Kind::General),
        ]
    );
    assert_eq!(recorder.count("add_linear_objective"), 1);
}

#[test]
fn linear_defining_constraints_are_posted_as_linear_rows() {
    let (backend, recorder) = scripted(Script::default());
    let mut session = Session::with_config(backend, CollectedSolution::new(), isolated()).unwrap();
    session.open().unwrap();

    let x = session.add_variable(&Variable::continuous(0.0, 1.0)).unwrap();
    let y = session.add_variable(&Variable::continuous(0.0, 1.0)).unwrap();
    let r = session.add_variable(&Variable::continuous(0.0, 5.0)).unwrap();
    session
        .add_constraint(0, &Constraint::defining(r, 3.0 * x + 2.0 * y))
        .unwrap();

    assert_eq!(recorder.count("add_linear_constraint 3"), 1);
}

#[test]
fn rich_backends_receive_native_kinds() {
    let (backend, recorder) = ScriptedBackend::<RichPolicy>::new(Script::default());
    let mut session = Session::with_config(backend, CollectedSolution::new(), isolated()).unwrap();
    session.open().unwrap();

    let x = session.add_variable(&Variable::continuous(0.0, 10.0)).unwrap();
    let y = session.add_variable(&Variable::continuous(0.0, 10.0)).unwrap();
    let r = session.add_variable(&Variable::continuous(0.0, 10.0)).unwrap();
    let b = session.add_variable(&Variable::binary()).unwrap();

    session
        .add_objective(0, &Objective::new(OptimizationSense::Minimize, x * x + 2.0 * x))
        .unwrap();
    session
        .add_constraint(0, &Constraint::defining(r, Expr::max([x, y])))
        .unwrap();
    // accepted natively, but the big-M rewrite is preferred
    session
        .add_constraint(1, &Constraint::logical(Expr::implies(b, Expr::le(x, 5.0))))
        .unwrap();

    assert_eq!(recorder.count("add_quadratic_objective 1"), 1);
    assert_eq!(recorder.count("add_max_constraint 2"), 1);
    assert_eq!(recorder.count("add_indicator_constraint"), 0);
    assert_eq!(recorder.count("add_linear_constraint 2"), 1);
}

#[test]
fn interruption_is_reported_before_the_native_status() {
    let interrupter = Interrupter::new();
    let (backend, _) = scripted(Script {
        primal: vec![3.0],
        stop_during_solve: true,
        ..Script::default()
    });
    let config = SessionConfig::default().with_interrupter(interrupter.clone());
    let mut sink = CollectedSolution::new();
    let report = Session::with_config(backend, &mut sink, config)
        .unwrap()
        .run(&bounded_model())
        .unwrap();

    assert!(interrupter.is_stopped());
    assert_eq!(report.status, SolveStatus::Interrupted);
    assert_eq!(report.solve_code, 600);
    assert_eq!(report.primal, None);
    assert_eq!(sink.message, "scripted 1.0: interrupted\n0 iterations\n");
}

#[test]
fn interruption_beats_a_failed_native_solve() {
    let interrupter = Interrupter::new();
    let (backend, _) = scripted(Script {
        stop_during_solve: true,
        solve_error: Some("aborted by user".to_string()),
        ..Script::default()
    });
    let config = SessionConfig::default().with_interrupter(interrupter.clone());
    let mut sink = CollectedSolution::new();
    let err = Session::with_config(backend, &mut sink, config)
        .unwrap()
        .run(&bounded_model())
        .unwrap_err();

    assert!(matches!(err, ConvertError::NativeFailure { operation: "solve", .. }));
    assert_eq!(sink.solve_code, Some(600));
    assert_eq!(sink.message, "scripted 1.0: interrupted\n");
    assert_eq!(sink.primal, None);
}

#[test]
fn global_stop_flag_does_not_leak_into_the_next_session() {
    let (first_backend, _) = scripted(Script {
        stop_during_solve: true,
        ..Script::default()
    });
    let first = Session::new(first_backend, CollectedSolution::new())
        .unwrap()
        .run(&bounded_model())
        .unwrap();
    assert_eq!(first.status, SolveStatus::Interrupted);

    let (second_backend, _) = scripted(Script {
        primal: vec![0.0],
        ..Script::default()
    });
    let second = Session::new(second_backend, CollectedSolution::new())
        .unwrap()
        .run(&bounded_model())
        .unwrap();
    assert_eq!(second.status, SolveStatus::Optimal);
    assert_eq!(second.solve_code, 0);
}

#[test]
fn limit_without_feasible_solution_is_unknown() {
    let (backend, _) = scripted(Script {
        native_status: TIME_LIMIT,
        feasible: false,
        ..Script::default()
    });
    let report = Session::with_config(backend, CollectedSolution::new(), isolated())
        .unwrap()
        .run(&bounded_model())
        .unwrap();

    assert_eq!(report.status, SolveStatus::Unknown);
    assert_eq!(report.solve_code, 501);
    assert_eq!(report.primal, None);
    assert_eq!(report.objective_value, None);
}

#[test]
fn native_solve_failure_is_still_reported() {
    let (backend, recorder) = scripted(Script {
        solve_error: Some("license expired".to_string()),
        ..Script::default()
    });
    let mut sink = CollectedSolution::new();
    let err = Session::with_config(backend, &mut sink, isolated())
        .unwrap()
        .run(&bounded_model())
        .unwrap_err();

    assert_eq!(err.to_string(), "scripted 1.0: solve failed: license expired");
    assert_eq!(sink.solve_code, Some(500));
    assert_eq!(sink.message, "scripted 1.0: license expired\n");
    assert_eq!(sink.primal, None);
    assert_eq!(recorder.closes(), 1);
}

#[test]
fn timing_block_is_printed_on_request() {
    let (backend, _) = scripted(Script::default());
    let mut sink = CollectedSolution::new();
    let mut session = Session::with_config(backend, &mut sink, isolated()).unwrap();
    session.parse_options("timing=1").unwrap();
    session.run(&bounded_model()).unwrap();
    assert!(session.times().is_some());
    drop(session);

    let lines: Vec<&str> = sink.output.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Setup time = ") && lines[0].ends_with('s'));
    assert!(lines[1].starts_with("Solution time = "));
    assert!(lines[2].starts_with("Output time = "));
}

#[test]
fn iis_is_reported_for_infeasible_problems() {
    let (backend, _) = scripted(Script {
        native_status: INFEASIBLE,
        feasible: false,
        iis: Some(IisReport {
            variables: vec![IisStatus::AtLower],
            constraints: vec![IisStatus::Member],
        }),
        ..Script::default()
    });
    let mut sink = CollectedSolution::new();
    let mut session = Session::with_config(backend, &mut sink, isolated()).unwrap();
    session.set_option("iisfind", 1_i64).unwrap();
    let report = session.run(&bounded_model()).unwrap();
    drop(session);

    assert_eq!(report.solve_code, 200);
    assert_eq!(report.message, "scripted 1.0: infeasible problem\n0 iterations\n");
    assert_eq!(sink.int_suffix(Suffix::IIS_VARIABLES), Some(&[1][..]));
    assert_eq!(sink.int_suffix(Suffix::IIS_CONSTRAINTS), Some(&[4][..]));
}

/// c0: 1 <= x <= 2 becomes two native rows, c1: y >= 0 one.
fn ranged_model() -> Model {
    let mut model = Model::new();
    let x = model.add_variable(VariableType::Continuous, 0.0, 10.0);
    let y = model.add_variable(VariableType::Continuous, 0.0, 10.0);
    model.add_objective(Objective::new(OptimizationSense::Minimize, x + y));
    model.add_constraint(Constraint::algebraic(x, 1.0, 2.0));
    model.add_constraint(Constraint::ge(y, 0.0));
    model
}

#[test]
fn split_row_duals_are_folded_onto_model_constraints() {
    let (backend, recorder) = scripted(Script {
        primal: vec![1.0, 0.0],
        row_duals: vec![1.0, 0.0, 1.0],
        ..Script::default()
    });
    let report = Session::with_config(backend, CollectedSolution::new(), isolated())
        .unwrap()
        .run(&ranged_model())
        .unwrap();

    assert_eq!(recorder.count("add_linear_constraint"), 2);
    assert_eq!(report.dual, Some(vec![1.0, 1.0]));
}

#[test]
fn split_row_iis_is_folded_onto_model_constraints() {
    let (backend, _) = scripted(Script {
        native_status: INFEASIBLE,
        feasible: false,
        iis: Some(IisReport {
            variables: vec![IisStatus::NotMember, IisStatus::AtLower],
            constraints: Vec::new(),
        }),
        row_iis: vec![IisStatus::NotMember, IisStatus::Member, IisStatus::NotMember],
        ..Script::default()
    });
    let mut sink = CollectedSolution::new();
    let mut session = Session::with_config(backend, &mut sink, isolated()).unwrap();
    session.set_option("iisfind", 1_i64).unwrap();
    session.run(&ranged_model()).unwrap();
    drop(session);

    assert_eq!(sink.int_suffix(Suffix::IIS_CONSTRAINTS), Some(&[4, 0][..]));
    assert_eq!(sink.int_suffix(Suffix::IIS_VARIABLES), Some(&[0, 1][..]));
}

#[test]
fn mip_gap_suffixes_follow_the_bitmask() {
    let (backend, _) = scripted(Script {
        mip_gap: Some(0.01),
        ..Script::default()
    });
    let mut model = Model::new();
    let n = model.add_variable(VariableType::Integer, 0.0, 3.0);
    model.add_objective(Objective::new(OptimizationSense::Minimize, n));

    let mut sink = CollectedSolution::new();
    let mut session = Session::with_config(backend, &mut sink, isolated()).unwrap();
    session.set_option("return_mipgap", 2_i64).unwrap();
    session.run(&model).unwrap();
    drop(session);

    assert_eq!(sink.dbl_suffix(Suffix::MIP_GAP_PROBLEM), Some(&[0.01][..]));
    assert_eq!(sink.dbl_suffix(Suffix::MIP_GAP_OBJECTIVE), None);
}

#[test]
fn writeprob_exports_before_solving() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.lp");

    let (backend, recorder) = scripted(Script::default());
    let mut session = Session::with_config(backend, CollectedSolution::new(), isolated()).unwrap();
    session
        .set_option("writeprob", path.display().to_string())
        .unwrap();
    session.run(&bounded_model()).unwrap();

    assert!(path.exists());
    let calls = recorder.calls();
    let export = calls.iter().position(|call| call.starts_with("export")).unwrap();
    let solve = calls.iter().position(|call| call == "solve").unwrap();
    assert!(export < solve);
}

#[test]
fn options_are_typed_and_case_insensitive() {
    let (backend, _) = scripted(Script::default());
    let mut session = Session::with_config(backend, CollectedSolution::new(), isolated()).unwrap();

    assert_eq!(session.parse_options("Threads=4 TIMELIM 2.5").unwrap(), 2);
    assert_eq!(session.get_option::<i64>("threads").unwrap(), 4);
    assert_eq!(session.get_option::<f64>("timelim").unwrap(), 2.5);
    assert_eq!(session.backend().threads, 4);

    let err = session.set_option("timelim", 3_i64).unwrap_err();
    assert_eq!(err.code(), "OPTION_TYPE_MISMATCH");
    let err = session.set_option("timelim", -1.0).unwrap_err();
    assert_eq!(err.code(), "OPTION_INVALID_VALUE");
    let err = session.get_option::<String>("nosuch").unwrap_err();
    assert_eq!(err.to_string(), "scripted 1.0: Unknown solver option \"nosuch\"");

    let help = session.option_help();
    for name in ["iisfind", "return_mipgap", "threads", "timelim", "timing", "writeprob"] {
        assert!(help.contains(name), "help should list {name}");
    }
}

#[test]
fn drop_releases_exactly_once() {
    let (backend, recorder) = scripted(Script::default());
    let mut session = Session::with_config(backend, CollectedSolution::new(), isolated()).unwrap();
    session.open().unwrap();
    drop(session);
    assert_eq!(recorder.closes(), 1);

    let (backend, recorder) = scripted(Script::default());
    let mut session = Session::with_config(backend, CollectedSolution::new(), isolated()).unwrap();
    session.open().unwrap();
    session.close().unwrap();
    drop(session);
    assert_eq!(recorder.closes(), 1);

    let (backend, recorder) = scripted(Script::default());
    drop(Session::with_config(backend, CollectedSolution::new(), isolated()).unwrap());
    assert_eq!(recorder.closes(), 0);
}
