//! Host harness: parallel parsing and timed application

use std::sync::Arc;
use std::time::Duration;

use patchlang::parallel::{parse_all, Patch, PatchRunner, PatchSource, RunnerConfig};
use patchlang::{Error, ScriptLibraries};
use serde_json::json;

fn config() -> RunnerConfig {
    RunnerConfig {
        max_parallelism: 2,
        timeout: Duration::from_millis(200),
        ..RunnerConfig::default()
    }
}

fn parse(sources: &[(&str, &str)]) -> Vec<Patch> {
    let sources: Vec<PatchSource> = sources
        .iter()
        .map(|(id, text)| PatchSource::new(*id, *text))
        .collect();
    parse_all(&sources, &config())
        .unwrap()
        .into_iter()
        .map(|patch| patch.unwrap())
        .collect()
}

fn select_all(_patch: &Patch, _target: &str) -> bool {
    true
}

#[tokio::test]
async fn test_apply_returns_patched_copy() {
    let patches = parse(&[("bump.patch", "version += 1; tags = tags + [\"new\"];")]);
    let runner = PatchRunner::new(config());
    let document = json!({"version": 1, "tags": []});

    let patched = runner.apply(&patches[0], &document).await.unwrap();

    assert_eq!(patched, json!({"version": 2, "tags": ["new"]}));
    assert_eq!(document, json!({"version": 1, "tags": []}));
}

#[tokio::test]
async fn test_runaway_patch_times_out() {
    let patches = parse(&[("spin.patch", "while (true) { }")]);
    let runner = PatchRunner::new(config());
    let document = json!({"untouched": true});

    let result = runner.apply(&patches[0], &document).await;

    assert!(matches!(result, Err(Error::Timeout(d)) if d == Duration::from_millis(200)));
    assert_eq!(document, json!({"untouched": true}));
}

#[tokio::test]
async fn test_deep_recursion_is_an_error_not_a_crash() {
    let patches = parse(&[("deep.patch", "function f($n) { return f($n + 1); } f(0);")]);
    let runner = PatchRunner::new(RunnerConfig {
        max_call_depth: 64,
        ..config()
    });

    match runner.apply(&patches[0], &json!({})).await {
        Err(Error::Evaluation(error)) => {
            assert!(error.full_message().contains("Maximum call depth of 64 exceeded"));
        }
        other => panic!("expected call depth failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_huge_results_are_errors_not_aborts() {
    let patches = parse(&[
        ("array.patch", "x = [0] * 1000000000000000;"),
        ("string.patch", "x = \"ab\" * 10000000000000;"),
        ("method.patch", "x = \"ab\".repeat(10000000000000);"),
    ]);
    let runner = PatchRunner::new(config());

    for patch in &patches {
        match runner.apply(patch, &json!({})).await {
            Err(Error::Evaluation(error)) => {
                assert!(error.full_message().contains("size limit"), "{}", patch.id);
            }
            other => panic!("expected a size limit failure, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_distinct_cyclic_values_compare_unequal() {
    let patches = parse(&[(
        "cycles.patch",
        "var $a = []; $a.push($a); var $b = []; $b.push($b); same = $a == $b; itself = $a == $a;",
    )]);
    let runner = PatchRunner::new(config());

    let patched = runner.apply(&patches[0], &json!({})).await.unwrap();
    assert_eq!(patched, json!({"same": false, "itself": true}));
}

#[tokio::test]
async fn test_non_object_document_is_rejected() {
    let patches = parse(&[("any.patch", "x = 1;")]);
    let runner = PatchRunner::new(config());
    let result = runner.apply(&patches[0], &json!([1, 2])).await;
    assert!(matches!(result, Err(Error::Json(_))));
}

#[tokio::test]
async fn test_apply_all_chains_patches_in_order() {
    let patches = parse(&[
        ("01.patch", "steps = [\"one\"];"),
        ("02.patch", "steps = steps + [\"two\"];"),
        ("03.patch", "count = steps.length();"),
    ]);
    let runner = PatchRunner::new(config());

    let outcome = runner
        .apply_all(&patches, "doc.json", &json!({}), &select_all)
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.applied, vec!["01.patch", "02.patch", "03.patch"]);
    assert_eq!(outcome.document, json!({"steps": ["one", "two"], "count": 2}));
}

#[tokio::test]
async fn test_apply_all_uses_selector() {
    let patches = parse(&[
        ("a.patch", "@target \"a.json\";\nname = \"a\";"),
        ("b.patch", "@target \"b.json\";\nname = \"b\";"),
    ]);
    let runner = PatchRunner::new(config());
    let by_target = |patch: &Patch, target: &str| {
        patch.metadata().target() == Some(&json!(target))
    };

    let outcome = runner
        .apply_all(&patches, "b.json", &json!({}), &by_target)
        .await;

    assert_eq!(outcome.applied, vec!["b.patch"]);
    assert_eq!(outcome.document, json!({"name": "b"}));
}

#[tokio::test]
async fn test_failed_patch_is_skipped() {
    let patches = parse(&[
        ("ok.patch", "a = 1;"),
        ("bad.patch", "b = 1; c = 1 / 0;"),
        ("later.patch", "d = a + 1;"),
    ]);
    let runner = PatchRunner::new(config());

    let outcome = runner
        .apply_all(&patches, "doc.json", &json!({}), &select_all)
        .await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.applied, vec!["ok.patch", "later.patch"]);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].patch_id, "bad.patch");
    // Partial writes of the failed patch are discarded
    assert_eq!(outcome.document, json!({"a": 1, "d": 2}));
}

#[tokio::test]
async fn test_fail_fast_stops_the_batch() {
    let patches = parse(&[
        ("bad.patch", "x = missing_name;"),
        ("never.patch", "y = 1;"),
    ]);
    let runner = PatchRunner::new(RunnerConfig {
        fail_fast: true,
        ..config()
    });

    let outcome = runner
        .apply_all(&patches, "doc.json", &json!({"keep": 1}), &select_all)
        .await;

    assert!(outcome.applied.is_empty());
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.document, json!({"keep": 1}));
}

#[tokio::test]
async fn test_runner_with_script_libraries() {
    let scripts = ScriptLibraries::new();
    scripts
        .load("defaults", "port = 8080; host = \"localhost\";")
        .unwrap();
    let runner = PatchRunner::with_scripts(config(), Arc::new(scripts));
    let patches = parse(&[("use.patch", "import \"defaults\"; server = {port: defaults.port};")]);

    let patched = runner.apply(&patches[0], &json!({})).await.unwrap();
    assert_eq!(patched, json!({"server": {"port": 8080}}));
}

#[test]
fn test_parse_all_reports_each_file() {
    let sources = vec![
        PatchSource::new("good.patch", "x = 1;"),
        PatchSource::new("lex.patch", "x = \"open;"),
        PatchSource::new("parse.patch", "x = ; y = ;"),
    ];
    let results = parse_all(&sources, &config()).unwrap();

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(Error::Lex(_))));
    match &results[2] {
        Err(Error::Parse(errors)) => assert_eq!(errors.len(), 2),
        other => panic!("expected parse errors, got {:?}", other),
    }
}
