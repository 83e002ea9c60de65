//! The overrides are read once per process, so this binary holds a single test
//! that sets them before the first read.

use nnrt::{CompileError, Compiler, CompilerOptions, Graph};

#[test]
fn environment_overrides_apply_on_top_of_options() {
    std::env::set_var("NNRT_BACKEND", " npu ");
    std::env::set_var("NNRT_DISABLE_DYNAMIC_TENSORS", "yes");

    let options = CompilerOptions::from_env();
    assert_eq!(options.backend, "npu");
    assert!(!options.enable_dynamic_tensors);
    assert!(options.verify);

    let explicit = CompilerOptions::default()
        .with_backend("cpu")
        .with_verify(false)
        .with_env_overrides();
    assert_eq!(explicit.backend, "npu");
    assert!(!explicit.verify);
    assert!(!explicit.enable_dynamic_tensors);

    // Values are cached after the first read.
    std::env::set_var("NNRT_BACKEND", "cpu");
    assert_eq!(CompilerOptions::from_env().backend, "npu");

    let err = Compiler::new(CompilerOptions::from_env())
        .compile(Graph::new())
        .expect_err("npu is not registered");
    assert!(matches!(err, CompileError::UnknownBackend(name) if name == "npu"));
}
