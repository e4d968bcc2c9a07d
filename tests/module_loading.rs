// ABOUTME: End-to-end tests for the module loader against real files on disk

use flowby_core::config::{FsConfig, NetConfig};
use flowby_core::host::DefaultHost;
use flowby_core::interpreter::{ExecError, Interpreter};
use flowby_core::module::ModuleLoader;
use flowby_core::sandbox::Sandbox;
use flowby_core::value::Value;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

fn run_file(dir: &PathBuf, entry: &str) -> Result<Interpreter<'static>, ExecError> {
    let source = fs::read_to_string(dir.join(entry)).unwrap();
    let tokens = flowby_core::lexer::tokenize(&source).unwrap();
    let (program, _warnings) = flowby_core::parser::parse(tokens).unwrap();

    let sandbox = Sandbox::new(FsConfig::default(), NetConfig::default()).unwrap();
    let host: &'static DefaultHost = Box::leak(Box::new(DefaultHost::new(sandbox, false)));
    let loader = Rc::new(ModuleLoader::new(dir.clone()));
    let mut interp = Interpreter::new(host, loader);
    interp.run_program(&program)?;
    Ok(interp)
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("flowby-module-test-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(dir.join("libs")).unwrap();
    dir
}

#[test]
fn selective_import_binds_exported_function() {
    let dir = scratch_dir("selective");
    fs::write(
        dir.join("libs").join("counter.flow"),
        "library counter\nconst START = 10\nexport function greet(n):\n    return f\"Hi {n + START}\"\n",
    )
    .unwrap();
    fs::write(
        dir.join("main.flow"),
        "from \"libs/counter.flow\" import greet\nlet out = greet(5)\n",
    )
    .unwrap();

    let interp = run_file(&dir, "main.flow").unwrap();
    assert_eq!(interp.get_var("out"), Some(Value::String("Hi 15".to_string())));
}

#[test]
fn alias_import_reaches_exports_through_member_access() {
    let dir = scratch_dir("alias");
    fs::write(
        dir.join("libs").join("counter.flow"),
        "library counter\nexport const START = 100\n",
    )
    .unwrap();
    fs::write(
        dir.join("main.flow"),
        "import counter from \"libs/counter.flow\"\nlet out = counter.START\n",
    )
    .unwrap();

    let interp = run_file(&dir, "main.flow").unwrap();
    assert_eq!(interp.get_var("out"), Some(Value::Integer(100)));
}

#[test]
fn repeated_import_hits_the_cache_instead_of_re_executing() {
    let dir = scratch_dir("cache");
    fs::write(
        dir.join("libs").join("counter.flow"),
        "library counter\nexport function next():\n    return 1\n",
    )
    .unwrap();
    fs::write(
        dir.join("main.flow"),
        "from \"libs/counter.flow\" import next\nfrom \"libs/counter.flow\" import next\nlet out = next()\n",
    )
    .unwrap();

    // Re-importing the same name in the same scope is a VR-005 parse error,
    // so this program should fail to parse rather than silently double-bind.
    let source = fs::read_to_string(dir.join("main.flow")).unwrap();
    let tokens = flowby_core::lexer::tokenize(&source).unwrap();
    assert!(flowby_core::parser::parse(tokens).is_err());
}

#[test]
fn circular_import_is_rejected() {
    let dir = scratch_dir("cycle");
    fs::write(
        dir.join("libs").join("a.flow"),
        "library a\nfrom \"b.flow\" import noop_b\nexport function noop_a():\n    return 1\n",
    )
    .unwrap();
    fs::write(
        dir.join("libs").join("b.flow"),
        "library b\nfrom \"a.flow\" import noop_a\nexport function noop_b():\n    return 1\n",
    )
    .unwrap();
    fs::write(
        dir.join("main.flow"),
        "from \"libs/a.flow\" import noop_a\n",
    )
    .unwrap();

    match run_file(&dir, "main.flow") {
        Err(ExecError::Runtime(e)) => {
            assert_eq!(e.kind_name(), "ModuleError");
            let message = e.to_string();
            assert!(message.contains("circular"));
            assert!(message.contains("a.flow"));
            assert!(message.contains("b.flow"));
        }
        other => panic!("expected a circular import ModuleError, got {:?}", other),
    }
}

#[test]
fn nested_import_resolves_relative_to_the_importing_file_not_the_root_script() {
    let dir = scratch_dir("nested");
    fs::create_dir_all(dir.join("libs").join("inner")).unwrap();
    fs::write(
        dir.join("libs").join("inner").join("deep.flow"),
        "library deep\nexport const VALUE = 42\n",
    )
    .unwrap();
    fs::write(
        dir.join("libs").join("counter.flow"),
        "library counter\nfrom \"inner/deep.flow\" import VALUE\nexport const FORWARDED = VALUE\n",
    )
    .unwrap();
    fs::write(
        dir.join("main.flow"),
        "from \"libs/counter.flow\" import FORWARDED\nlet out = FORWARDED\n",
    )
    .unwrap();

    let interp = run_file(&dir, "main.flow").unwrap();
    assert_eq!(interp.get_var("out"), Some(Value::Integer(42)));
}

#[test]
fn missing_export_is_a_module_error() {
    let dir = scratch_dir("missing-export");
    fs::write(dir.join("libs").join("counter.flow"), "library counter\nconst START = 1\n").unwrap();
    fs::write(
        dir.join("main.flow"),
        "from \"libs/counter.flow\" import START\n",
    )
    .unwrap();

    match run_file(&dir, "main.flow") {
        Err(ExecError::Runtime(e)) => assert_eq!(e.kind_name(), "ModuleError"),
        other => panic!("expected ModuleError, got {:?}", other),
    }
}

#[test]
fn library_name_must_match_file_stem() {
    let dir = scratch_dir("mismatch");
    fs::write(dir.join("libs").join("counter.flow"), "library wrong_name\nexport const X = 1\n").unwrap();
    fs::write(dir.join("main.flow"), "from \"libs/counter.flow\" import X\n").unwrap();

    match run_file(&dir, "main.flow") {
        Err(ExecError::Runtime(e)) => assert_eq!(e.kind_name(), "ModuleError"),
        other => panic!("expected ModuleError, got {:?}", other),
    }
}
