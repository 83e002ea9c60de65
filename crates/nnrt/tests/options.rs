use nnrt::backend::registry::{create_backend, has_backend, list_backends};
use nnrt::{CompileError, Compiler, CompilerOptions, Graph};

#[test]
fn options_round_trip_through_json() {
    let options = CompilerOptions::default()
        .with_backend("npu")
        .with_verify(false)
        .with_dynamic_tensors(false);
    let json = serde_json::to_string(&options).expect("serialize");
    let back: CompilerOptions = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, options);
}

#[test]
fn missing_fields_take_defaults() {
    let options: CompilerOptions =
        serde_json::from_str(r#"{"verify": false}"#).expect("partial options");
    assert_eq!(options.backend, "cpu");
    assert!(!options.verify);
    assert!(options.enable_dynamic_tensors);
}

#[test]
fn unknown_backend_is_reported() {
    assert!(!has_backend("does-not-exist"));
    assert!(create_backend("does-not-exist").is_none());
    assert!(!list_backends().iter().any(|name| name == "does-not-exist"));

    let compiler = Compiler::new(CompilerOptions::default().with_backend("does-not-exist"));
    let err = compiler.compile(Graph::new()).expect_err("no such backend");
    assert!(matches!(err, CompileError::UnknownBackend(name) if name == "does-not-exist"));
}
