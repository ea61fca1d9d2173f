mod common;

use std::sync::Arc;
use std::time::Duration;

use cmm_submit::error::{AppError, ConfigError, DiscoveryError};
use cmm_submit::{dry_run, Orchestrator, RunReport, SubmitOptions, WorkItem};
use common::{items, sink, Behavior, LogCapture, ScriptedFactory};
use tokio_test::{assert_err, assert_ok};

fn options(max_concurrent: usize, items_per_division: usize) -> SubmitOptions {
    SubmitOptions {
        max_concurrent,
        items_per_division,
        verbosity: 2,
        ..SubmitOptions::default()
    }
}

#[tokio::test]
async fn end_to_end_sequential_run() {
    let (_tmp, sink) = sink();
    let factory = Arc::new(
        ScriptedFactory::new().with("b", Behavior::Fail("timeout".to_string())),
    );
    let orchestrator = Orchestrator::new(factory.clone(), sink.clone());

    let report = orchestrator
        .submit(items(&["a", "b", "c"]), &options(1, 2))
        .await
        .unwrap();

    let expected = RunReport {
        processed: vec!["a".into(), "b".into(), "c".into()],
        succeeded: ["a".to_string(), "c".to_string()].into_iter().collect(),
        failed: ["b".to_string()].into_iter().collect(),
        failure_reasons: [("b".to_string(), "timeout".to_string())].into_iter().collect(),
    };
    assert_eq!(report, expected);
    assert_eq!(factory.calls(), vec!["a", "b", "c"]);

    let log = std::fs::read_to_string(sink.path()).unwrap();
    assert!(log.contains("Error in label = b"));
    assert!(!log.contains("Error in label = a"));
}

#[tokio::test]
async fn failure_in_the_middle_does_not_stop_the_division() {
    let (_tmp, sink) = sink();
    let factory = Arc::new(
        ScriptedFactory::new()
            .with("i3", Behavior::Fail("missing form element".to_string()))
            .with("i5", Behavior::Fail("no download".to_string())),
    );
    let orchestrator = Orchestrator::new(factory.clone(), sink);

    let report = orchestrator
        .submit(items(&["i1", "i2", "i3", "i4", "i5"]), &options(1, 5))
        .await
        .unwrap();

    assert_eq!(factory.calls(), vec!["i1", "i2", "i3", "i4", "i5"]);
    assert_eq!(report.processed, vec!["i1", "i2", "i3", "i4", "i5"]);
    assert!(report.succeeded.contains("i4"));
    assert_eq!(report.failure_reasons["i3"], "missing form element");
    assert_eq!(report.failure_reasons["i5"], "no download");
    assert!(report.check_invariants());
}

#[tokio::test]
async fn panicking_item_is_isolated() {
    let (_tmp, sink) = sink();
    let factory = Arc::new(ScriptedFactory::new().with("p", Behavior::Panic));
    let orchestrator = Orchestrator::new(factory, sink);

    let report = orchestrator
        .submit(items(&["x", "p", "y"]), &options(1, 3))
        .await
        .unwrap();

    assert_eq!(report.succeeded.len(), 2);
    assert!(report.failed.contains("p"));
    assert!(report.failure_reasons["p"].contains("unexpected page state"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn at_most_two_divisions_are_active() {
    let (_tmp, sink) = sink();
    let factory = Arc::new(ScriptedFactory::new().holding(Duration::from_millis(50)));
    let orchestrator = Orchestrator::new(factory.clone(), sink);

    let report = orchestrator
        .submit(items(&["d1", "d2", "d3", "d4", "d5"]), &options(2, 1))
        .await
        .unwrap();

    assert_eq!(factory.probe.peak(), 2);
    assert_eq!(factory.probe.active(), 0);
    assert_eq!(report.succeeded.len(), 5);
    assert!(report.check_invariants());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sequential_run_never_overlaps() {
    let (_tmp, sink) = sink();
    let factory = Arc::new(ScriptedFactory::new().holding(Duration::from_millis(10)));
    let orchestrator = Orchestrator::new(factory.clone(), sink);

    orchestrator
        .submit(items(&["s1", "s2", "s3", "s4"]), &options(1, 1))
        .await
        .unwrap();

    assert_eq!(factory.probe.peak(), 1);
}

#[tokio::test]
async fn session_that_cannot_open_fails_only_its_division() {
    let (_tmp, sink) = sink();
    let factory = Arc::new(ScriptedFactory::new().failing_open(1));
    let orchestrator = Orchestrator::new(factory.clone(), sink.clone());

    let report = orchestrator
        .submit(items(&["a", "b", "c", "d", "e"]), &options(1, 2))
        .await
        .unwrap();

    let failed: Vec<&str> = report.failed.iter().map(String::as_str).collect();
    assert_eq!(failed, vec!["c", "d"]);
    assert!(report.failure_reasons["c"].contains("browser binary not found"));
    assert_eq!(report.succeeded.len(), 3);
    assert_eq!(report.processed, vec!["a", "b", "c", "d", "e"]);
    assert_eq!(factory.calls(), vec!["a", "b", "e"]);

    let log = std::fs::read_to_string(sink.path()).unwrap();
    assert!(log.contains("Error in label = c"));
    assert!(log.contains("Error in label = d"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pooled_run_matches_sequential_run() {
    let ids = ["m1", "m2", "m3", "m4", "m5", "m6", "m7"];
    let build = || {
        Arc::new(
            ScriptedFactory::new()
                .with("m2", Behavior::Fail("timeout".to_string()))
                .with("m6", Behavior::Sleep(Duration::from_millis(30)))
                .with("m7", Behavior::Fail("remote error".to_string())),
        )
    };

    let (_tmp1, sink1) = sink();
    let sequential = Orchestrator::new(build(), sink1)
        .submit(items(&ids), &options(1, 2))
        .await
        .unwrap();

    let (_tmp2, sink2) = sink();
    let pooled = Orchestrator::new(build(), sink2)
        .submit(items(&ids), &options(4, 2))
        .await
        .unwrap();

    assert!(pooled.is_equivalent(&sequential));
    assert!(pooled.check_invariants());
}

/// 逐条进度日志：分组内的 "处理第 i/n 个条目" 与成功的 "已下载"
fn per_item_lines(logs: &LogCapture) -> usize {
    logs.lines_containing("个条目 [#") + logs.lines_containing("已下载")
}

#[tokio::test]
async fn pooled_sessions_are_quiet_unless_disabled() {
    let ids = ["q1", "q2", "q3", "q4"];
    let (_tmp, sink) = sink();

    let logs = LogCapture::default();
    let guard = logs.install();
    let factory = Arc::new(ScriptedFactory::new());
    let quiet = SubmitOptions {
        verbosity: 1,
        ..options(2, 2)
    };
    Orchestrator::new(factory.clone(), sink.clone())
        .submit(items(&ids), &quiet)
        .await
        .unwrap();
    drop(guard);
    assert!(factory.seen_options.lock().unwrap().iter().all(|o| o.verbosity == 0));
    assert_eq!(per_item_lines(&logs), 0);
    assert!(logs.lines_containing("分组处理完成") > 0);

    let logs = LogCapture::default();
    let guard = logs.install();
    let factory = Arc::new(ScriptedFactory::new());
    let loud = SubmitOptions {
        quiet_pooled_sessions: false,
        ..options(2, 2)
    };
    Orchestrator::new(factory.clone(), sink.clone())
        .submit(items(&ids), &loud)
        .await
        .unwrap();
    drop(guard);
    assert!(factory.seen_options.lock().unwrap().iter().all(|o| o.verbosity == 2));
    assert_eq!(per_item_lines(&logs), 8);

    let factory = Arc::new(ScriptedFactory::new());
    Orchestrator::new(factory.clone(), sink)
        .submit(items(&ids), &options(1, 1))
        .await
        .unwrap();
    assert!(factory.seen_options.lock().unwrap().iter().all(|o| o.verbosity == 2));
}

#[tokio::test]
async fn pooled_failures_are_still_logged() {
    let (_tmp, sink) = sink();
    let logs = LogCapture::default();
    let guard = logs.install();
    let factory = Arc::new(
        ScriptedFactory::new().with("f2", Behavior::Fail("remote error".to_string())),
    );

    let report = Orchestrator::new(factory, sink)
        .submit(items(&["f1", "f2", "f3"]), &options(3, 1))
        .await
        .unwrap();
    drop(guard);

    assert!(report.failed.contains("f2"));
    assert_eq!(logs.lines_containing("处理失败: remote error"), 1);
    assert_eq!(per_item_lines(&logs), 0);
}

#[tokio::test]
async fn invalid_configuration_aborts_before_any_work() {
    let (_tmp, sink) = sink();
    let factory = Arc::new(ScriptedFactory::new());
    let orchestrator = Orchestrator::new(factory.clone(), sink);

    let err = orchestrator
        .submit(items(&["a"]), &options(5, 1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Config(ConfigError::ParallelismOutOfRange { value: 5, .. })
    ));

    let err = orchestrator
        .submit(items(&["a"]), &options(1, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Config(ConfigError::ZeroItemsPerDivision)));

    assert!(factory.calls().is_empty());
    assert!(factory.seen_options.lock().unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_ids_are_not_merged() {
    let (_tmp, sink) = sink();
    let factory = Arc::new(ScriptedFactory::new());
    let orchestrator = Orchestrator::new(factory.clone(), sink);

    let mut work = items(&["a", "b"]);
    work.push(WorkItem::new(2, "a", "/x.pdb", "/x.mrc", "/x.json"));

    let err = orchestrator.submit(work, &options(1, 1)).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Discovery(DiscoveryError::DuplicateItemId { ref id }) if id == "a"
    ));
    assert!(factory.calls().is_empty());
}

#[tokio::test]
async fn empty_input_gives_empty_report() {
    let (_tmp, sink) = sink();
    let orchestrator = Orchestrator::new(Arc::new(ScriptedFactory::new()), sink);

    let report = assert_ok!(orchestrator.submit(Vec::new(), &options(2, 3)).await);
    assert_eq!(report, RunReport::default());
}

#[test]
fn dry_run_reports_plan_without_remote_interaction() {
    let work = items(&["a", "b", "c", "d", "e"]);
    let preview = assert_ok!(dry_run(&work, &options(2, 2)));

    assert_eq!(preview.item_count, 5);
    let plan: Vec<Vec<String>> = preview.divisions.iter().map(|d| d.item_ids.clone()).collect();
    assert_eq!(plan, vec![vec!["a", "b"], vec!["c", "d"], vec!["e"]]);
    assert_eq!(preview.first_item.as_ref().map(|i| i.id.as_str()), Some("a"));

    let json = serde_json::to_value(&preview).unwrap();
    assert_eq!(json["options"]["max_concurrent"], 2);
    assert_eq!(json["first_item"]["id"], "a");

    assert_err!(dry_run(&work, &options(0, 2)));
    assert_err!(dry_run(&work, &options(1, 0)));
}

#[test]
fn dry_run_on_empty_input_has_no_first_item() {
    let preview = assert_ok!(dry_run(&[], &options(1, 1)));
    assert_eq!(preview.item_count, 0);
    assert!(preview.divisions.is_empty());
    assert!(preview.first_item.is_none());
}
