//! Script libraries and `import` resolution

use std::sync::Arc;

use patchlang::error::EvalErrorKind;
use patchlang::{parse_source, to_json, Context, Error, Libraries, ScriptLibraries, Value};
use serde_json::{json, Value as JsonValue};

fn run_with(scripts: Arc<ScriptLibraries>, source: &str) -> patchlang::Result<JsonValue> {
    let program = parse_source(source, "main.patch")?;
    let root = Value::new_object();
    let ctx = Context::new(root.clone(), Libraries::with_scripts(scripts));
    program.execute(&ctx)?;
    to_json(&Value::Object(root))
}

fn libraries(entries: &[(&str, &str)]) -> Arc<ScriptLibraries> {
    let scripts = ScriptLibraries::new();
    for (name, source) in entries {
        scripts.load(name, source).unwrap();
    }
    Arc::new(scripts)
}

#[test]
fn test_library_exports_top_level_names() {
    let scripts = libraries(&[("util", "double = function ($n) -> $n * 2; factor = 3;")]);
    let result = run_with(scripts, "import \"util\"; r = util.double(4) * util.factor;").unwrap();
    assert_eq!(result, json!({"r": 24}));
}

#[test]
fn test_library_functions_keep_their_own_imports() {
    let scripts = libraries(&[(
        "fmt",
        "import \"strings\"; shout = function ($s) -> strings.upper($s) + \"!\";",
    )]);
    let result = run_with(scripts, "import \"fmt\"; r = fmt.shout(\"hey\");").unwrap();
    assert_eq!(result["r"], json!("HEY!"));
}

#[test]
fn test_library_variables_stay_private() {
    let scripts = libraries(&[("counter", "var $hidden = 1; visible = $hidden + 1;")]);
    let result = run_with(scripts, "import \"counter\" as c; r = c.visible; h = \"hidden\" in c;")
        .unwrap();
    assert_eq!(result, json!({"r": 2, "h": false}));
}

#[test]
fn test_imports_are_cached_per_run() {
    let scripts = libraries(&[("util", "x = 1;")]);
    let result = run_with(scripts, "import \"util\"; util.x = 5; y = import(\"util\").x;").unwrap();
    assert_eq!(result["y"], json!(5));
}

#[test]
fn test_native_libraries_win_over_scripts() {
    let scripts = libraries(&[("math", "PI = 3;")]);
    let result = run_with(scripts, "import \"math\"; big = math.PI > 3;").unwrap();
    assert_eq!(result["big"], json!(true));
}

#[test]
fn test_cyclic_import() {
    let scripts = libraries(&[("a", "import \"b\";"), ("b", "import \"a\";")]);
    match run_with(scripts, "import \"a\";") {
        Err(Error::Evaluation(error)) => {
            assert!(matches!(error.kind, EvalErrorKind::InLibrary { ref name } if name == "a"));
            assert_eq!(
                error.root_cause().kind,
                EvalErrorKind::CyclicImport {
                    chain: "a -> b -> a".to_string()
                }
            );
            assert!(Error::Evaluation(error)
                .to_string()
                .contains("Recursive import detected"));
        }
        other => panic!("expected a cyclic import, got {:?}", other),
    }
}

#[test]
fn test_self_import() {
    let scripts = libraries(&[("selfref", "import \"selfref\" as again;")]);
    match run_with(scripts, "import \"selfref\";") {
        Err(Error::Evaluation(error)) => {
            assert!(matches!(
                error.root_cause().kind,
                EvalErrorKind::CyclicImport { .. }
            ));
        }
        other => panic!("expected a cyclic import, got {:?}", other),
    }
}

#[test]
fn test_failing_library_names_itself() {
    let scripts = libraries(&[("broken", "x = 1 / 0;")]);
    match run_with(scripts, "import \"broken\";") {
        Err(error) => {
            let message = error.to_string();
            assert!(message.contains("Error while loading library broken"));
            assert!(message.contains("Division by zero"));
        }
        Ok(_) => panic!("expected failure"),
    }
}

#[test]
fn test_unknown_script_library() {
    let scripts = libraries(&[("util", "x = 1;")]);
    match run_with(scripts, "import \"utils\";") {
        Err(Error::Evaluation(error)) => {
            assert_eq!(
                error.kind,
                EvalErrorKind::UnknownLibrary {
                    name: "utils".to_string()
                }
            );
        }
        other => panic!("expected an unknown library, got {:?}", other),
    }
}

#[test]
fn test_load_reports_parse_errors() {
    let scripts = ScriptLibraries::new();
    assert!(matches!(scripts.load("bad", "x = ;"), Err(Error::Parse(_))));
    assert!(scripts.is_empty());
    assert!(scripts.load("good", "x = 1;").is_ok());
    assert!(scripts.contains("good"));
    assert_eq!(scripts.len(), 1);
}
