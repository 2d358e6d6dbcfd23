// End-to-end behavior of the engine on registered suites: ordering, skip
// propagation, expected failures and hook brackets.

use integrate::{
    Engine, Event, IntegrateError, NullObserver, Observer, Status, Suite, SuiteReport,
    TestOptions,
};

fn run<S>(suite: &mut Suite<S>) -> Result<SuiteReport, IntegrateError> {
    let mut observer = NullObserver;
    Engine::new(&mut observer).run(suite)
}

fn status(report: &SuiteReport, name: &str) -> Status {
    report.ledger.get(name).map(|o| o.status()).unwrap()
}

/// Records the event stream as short strings.
#[derive(Default)]
struct Recorder {
    events: Vec<String>,
}

impl Observer for Recorder {
    fn on_event(&mut self, event: &Event<'_>) {
        let line = match event {
            Event::SuiteStarted { suite, tests, .. } => format!("start {suite} {}", tests.len()),
            Event::TestStarted { descriptor } => format!("run {}", descriptor.name()),
            Event::TestFinished {
                descriptor,
                outcome,
                ledger,
                summary,
                ..
            } => {
                // The entry is visible to observers as soon as the test finishes.
                assert_eq!(ledger.get(descriptor.name()), Some(*outcome));
                format!("done {} {} {}", descriptor.name(), outcome.status(), summary.total)
            }
            Event::SuiteFinished { report } => format!("finish {}", report.summary),
            Event::SuiteAborted { suite, .. } => format!("abort {suite}"),
        };
        self.events.push(line);
    }
}

#[test]
fn failed_dependency_skips_its_dependent() {
    // T1 passes, T2 fails, T3 is skipped because of T2.
    let mut suite = Suite::builder("scenario", ())
        .test("t3", TestOptions::new().skip_if_failed(["t2"]), |_, _| {
            panic!("t3 must not run")
        })
        .test("t1", TestOptions::new(), |_, check| check.equal(1, 1, None))
        .test("t2", TestOptions::new().depends(["t1"]), |_, check| {
            check.equal(1, 2, None)
        })
        .build();

    let report = run(&mut suite).unwrap();
    assert_eq!(report.order, vec!["t1", "t2", "t3"]);
    assert_eq!(status(&report, "t1"), Status::Passed);
    assert_eq!(status(&report, "t2"), Status::Failed);
    assert_eq!(status(&report, "t3"), Status::SkippedDependency);
    assert_eq!(
        (report.summary.total, report.summary.succeeded, report.summary.failed, report.summary.skipped),
        (3, 1, 1, 1)
    );
    assert_eq!(report.ledger.get("t2").unwrap().error_message(), "1 != 2");
}

#[test]
fn passed_dependency_lets_the_dependent_run() {
    let mut suite = Suite::builder("s", ())
        .test("a", TestOptions::new(), |_, _| {})
        .test("b", TestOptions::new().skip_if_failed(["a"]), |_, _| {})
        .build();
    let report = run(&mut suite).unwrap();
    assert_eq!(status(&report, "b"), Status::Passed);
}

#[test]
fn skipped_dependency_also_skips_the_dependent() {
    let mut suite = Suite::builder("s", ())
        .test("a", TestOptions::new().skip(true), |_, _| {})
        .test("b", TestOptions::new().skip_if_failed(["a"]), |_, _| {})
        .test("c", TestOptions::new().depends(["a"]), |_, _| {})
        .build();
    let report = run(&mut suite).unwrap();
    assert_eq!(status(&report, "a"), Status::SkippedExplicit);
    assert_eq!(status(&report, "b"), Status::SkippedDependency);
    // A plain ordering dependency never skips.
    assert_eq!(status(&report, "c"), Status::Passed);
}

#[test]
fn explicit_skip_wins_over_everything() {
    let mut suite = Suite::builder("s", ())
        .test(
            "never",
            TestOptions::new().skip(true).expect_fail(true),
            |_, check| check.fail("ran"),
        )
        .build();
    let report = run(&mut suite).unwrap();
    let outcome = report.ledger.get("never").unwrap();
    assert_eq!(outcome.status(), Status::SkippedExplicit);
    assert!(outcome.failures.is_empty());
}

#[test]
fn expected_failure_counts_as_failed_and_expected() {
    let mut suite = Suite::builder("s", ())
        .test("known_bug", TestOptions::new().expect_fail(true), |_, check| {
            check.is_true(false, None)
        })
        .build();
    let report = run(&mut suite).unwrap();
    assert_eq!(status(&report, "known_bug"), Status::ExpectedFailed);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.expected_failed, 1);
    assert!(!report.has_unexpected_failures());
}

#[test]
fn teardown_runs_once_per_test_whatever_the_body_does() {
    let mut suite = Suite::builder("s", 0usize)
        .teardown_test(|count| {
            *count += 1;
            Ok::<(), String>(())
        })
        .test("passes", TestOptions::new(), |_, _| {})
        .test("panics", TestOptions::new(), |_, _| panic!("boom"))
        .try_test("errors", TestOptions::new(), |_, _| Err("refused"))
        .test("skipped", TestOptions::new().skip(true), |_, _| {})
        .build();
    let report = run(&mut suite).unwrap();
    assert_eq!(*suite.fixture(), 3);
    assert_eq!(
        report.ledger.get("panics").unwrap().error_message(),
        "did raise panic: boom"
    );
    assert_eq!(
        report.ledger.get("errors").unwrap().error_message(),
        "did raise str: refused"
    );
}

#[test]
fn suite_hooks_bracket_the_run() {
    let mut suite = Suite::builder("s", Vec::<String>::new())
        .setup_all(|log| {
            log.push("setup_all".into());
            Ok::<(), String>(())
        })
        .teardown_all(|log| {
            log.push("teardown_all".into());
            Ok::<(), String>(())
        })
        .setup_test(|log| {
            log.push("setup".into());
            Ok::<(), String>(())
        })
        .test("b", TestOptions::new().depends(["a"]), |log, _| log.push("b".into()))
        .test("a", TestOptions::new(), |log, _| log.push("a".into()))
        .build();
    run(&mut suite).unwrap();
    assert_eq!(
        suite.fixture(),
        &vec!["setup_all", "setup", "a", "setup", "b", "teardown_all"]
    );
}

#[test]
fn running_twice_gives_identical_results() {
    fn build() -> Suite {
        Suite::builder("s", ())
            .test("c", TestOptions::new().skip_if_failed(["b"]), |_, _| {})
            .test("b", TestOptions::new().depends(["a"]), |_, check| {
                check.contains("hello", "bye", Some("greeting"))
            })
            .test("a", TestOptions::new(), |_, _| {})
            .test("d", TestOptions::new(), |_, _| {})
            .build()
    }
    let first = run(&mut build()).unwrap();
    let second = run(&mut build()).unwrap();
    assert_eq!(first.order, second.order);
    assert_eq!(first.ledger, second.ledger);
    assert_eq!(first.summary, second.summary);
}

#[test]
fn cycle_aborts_before_any_test_runs() {
    let mut recorder = Recorder::default();
    let mut suite = Suite::builder("loop", ())
        .test("a", TestOptions::new().depends(["b"]), |_, _| panic!("ran"))
        .test("b", TestOptions::new().skip_if_failed(["a"]), |_, _| panic!("ran"))
        .build();
    let err = Engine::new(&mut recorder).run(&mut suite).unwrap_err();
    match err {
        IntegrateError::DependencyCycle { from, to, cycle, .. } => {
            let mut pair = vec![from, to];
            pair.sort();
            assert_eq!(pair, vec!["a", "b"]);
            assert_eq!(cycle.len(), 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(recorder.events, vec!["abort loop"]);
}

#[test]
fn unknown_dependency_is_reported_with_its_test() {
    let mut suite = Suite::builder("s", ())
        .test("a", TestOptions::new().depends(["ghost"]), |_, _| {})
        .build();
    let err = run(&mut suite).unwrap_err();
    assert_eq!(
        err.to_string(),
        "test 'a' in suite 's' depends on unknown test 'ghost'"
    );
}

#[test]
fn observers_see_every_step_in_order() {
    let mut recorder = Recorder::default();
    let mut suite = Suite::builder("s", ())
        .test("second", TestOptions::new().depends(["first"]), |_, _| {})
        .test("first", TestOptions::new(), |_, _| {})
        .build();
    Engine::new(&mut recorder).run(&mut suite).unwrap();
    assert_eq!(
        recorder.events,
        vec![
            "start s 2",
            "run first",
            "done first passed 1",
            "run second",
            "done second passed 2",
            "finish Ran 2 tests, 2 succeeded, 0 failed, 0 skipped",
        ]
    );
}

#[test]
fn ledger_entries_appear_as_each_test_finishes() {
    #[derive(Default)]
    struct Snapshots(Vec<Vec<String>>);
    impl Observer for Snapshots {
        fn on_event(&mut self, event: &Event<'_>) {
            if let Event::TestFinished { ledger, .. } = event {
                self.0.push(ledger.iter().map(|(name, _)| name.to_string()).collect());
            }
        }
    }

    let mut snapshots = Snapshots::default();
    let mut suite = Suite::builder("s", ())
        .test("b", TestOptions::new().depends(["a"]), |_, _| {})
        .test("a", TestOptions::new(), |_, check| check.fail("nope"))
        .build();
    Engine::new(&mut snapshots).run(&mut suite).unwrap();
    assert_eq!(snapshots.0, vec![vec!["a"], vec!["a", "b"]]);
}

#[test]
fn caught_panics_report_where_they_were_raised() {
    let mut suite = Suite::builder("s", ())
        .test("boom", TestOptions::new(), |_, _| panic!("kaboom"))
        .build();
    let report = run(&mut suite).unwrap();
    let failure = &report.ledger.get("boom").unwrap().failures[0];
    assert!(
        failure.location.contains("engine_scenarios.rs"),
        "{}",
        failure.location
    );
}
