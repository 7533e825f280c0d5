//! End-to-end pipeline tests driven by a scripted compiler.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use slipway::builder::BuildContext;
use slipway::compiler::{
    CompileError, CompileInput, CompileOutput, Compiler, ContractArtifact,
};
use slipway::ops::{compile_project, compile_project_with_cancel};
use slipway::util::diagnostic::Diagnostic;
use slipway::util::hash::sha256_bytes;
use slipway::Config;

/// Deterministic in-process compiler. Records every invocation and can be
/// scripted to fail on specific files.
struct MockCompiler {
    calls: Mutex<Vec<Vec<String>>>,
    fail_files: HashSet<String>,
    cancel_after: Option<Arc<AtomicBool>>,
}

impl MockCompiler {
    fn new() -> Self {
        MockCompiler {
            calls: Mutex::new(Vec::new()),
            fail_files: HashSet::new(),
            cancel_after: None,
        }
    }

    fn failing(files: &[&str]) -> Self {
        MockCompiler {
            calls: Mutex::new(Vec::new()),
            fail_files: files.iter().map(|s| s.to_string()).collect(),
            cancel_after: None,
        }
    }

    /// Sets `flag` after each compilation, as an external abort would.
    fn cancelling(flag: Arc<AtomicBool>) -> Self {
        MockCompiler {
            calls: Mutex::new(Vec::new()),
            fail_files: HashSet::new(),
            cancel_after: Some(flag),
        }
    }

    fn invocations(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// All file sets passed to the compiler, each sorted.
    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Every file compiled across all invocations, sorted.
    fn compiled_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self.calls().into_iter().flatten().collect();
        files.sort();
        files
    }
}

impl Compiler for MockCompiler {
    fn compile(&self, input: &CompileInput) -> Result<CompileOutput, CompileError> {
        let mut files: Vec<String> = input.sources.iter().map(|(p, _)| p.clone()).collect();
        files.sort();
        self.calls.lock().unwrap().push(files);

        if let Some(flag) = &self.cancel_after {
            flag.store(true, Ordering::SeqCst);
        }

        if let Some((path, _)) = input
            .sources
            .iter()
            .find(|(p, _)| self.fail_files.contains(p))
        {
            return Err(CompileError::Source {
                diagnostics: vec![Diagnostic::error("scripted failure").at(path.clone(), 1, 1)],
            });
        }

        let contracts = input
            .sources
            .iter()
            .map(|(path, content)| {
                let name = path
                    .rsplit('/')
                    .next()
                    .and_then(|f| f.strip_suffix(".sol"))
                    .unwrap_or("Contract")
                    .to_string();
                ContractArtifact {
                    name,
                    source: path.clone(),
                    abi: serde_json::json!([]),
                    // Output depends only on input bytes, so rebuilding
                    // unchanged sources yields identical artifacts.
                    bytecode: sha256_bytes(content.as_bytes())[..16].to_string(),
                    deployed_bytecode: sha256_bytes(content.as_bytes())[16..32].to_string(),
                    source_map: String::new(),
                }
            })
            .collect();

        Ok(CompileOutput {
            contracts,
            diagnostics: Vec::new(),
        })
    }

    fn version(&self) -> &str {
        "0.8.20"
    }
}

fn write_source(root: &Path, rel: &str, content: &str) {
    let path = root.join("contracts").join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn context(root: &Path) -> BuildContext {
    BuildContext::from_config(root, &Config::default())
}

/// Snapshot of every artifact file's bytes, keyed by relative path.
fn artifact_snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut snapshot = BTreeMap::new();
    let dir = root.join("artifacts");
    if !dir.exists() {
        return snapshot;
    }
    for entry in walk(&dir) {
        let rel = entry.strip_prefix(&dir).unwrap().to_string_lossy().into_owned();
        snapshot.insert(rel, std::fs::read(&entry).unwrap());
    }
    snapshot
}

fn walk(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            out.extend(walk(&path));
        } else {
            out.push(path);
        }
    }
    out.sort();
    out
}

#[test]
fn first_build_compiles_everything() {
    let tmp = TempDir::new().unwrap();
    write_source(tmp.path(), "Base.sol", "contract Base {}");
    write_source(
        tmp.path(),
        "Child.sol",
        "import \"./Base.sol\"; contract Child {}",
    );

    let mock = MockCompiler::new();
    let result = compile_project(&context(tmp.path()), &mock).unwrap();

    assert!(result.success());
    assert_eq!(result.compiled, 2);
    assert_eq!(result.reused, 0);
    assert_eq!(mock.invocations(), 2);
    assert_eq!(result.artifacts.len(), 2);
    assert!(result.artifacts.iter().all(|p| p.exists()));
    assert!(tmp.path().join("cache/index").exists());
}

#[test]
fn second_build_does_no_compiler_work_and_is_byte_identical() {
    let tmp = TempDir::new().unwrap();
    write_source(tmp.path(), "Base.sol", "contract Base {}");
    write_source(
        tmp.path(),
        "Child.sol",
        "import \"./Base.sol\"; contract Child {}",
    );

    compile_project(&context(tmp.path()), &MockCompiler::new()).unwrap();
    let before = artifact_snapshot(tmp.path());

    let second = MockCompiler::new();
    let result = compile_project(&context(tmp.path()), &second).unwrap();

    assert!(result.success());
    assert_eq!(second.invocations(), 0);
    assert_eq!(result.compiled, 0);
    assert_eq!(result.reused, 2);
    // Cached artifacts are still surfaced to the caller.
    assert_eq!(result.artifacts.len(), 2);
    assert_eq!(artifact_snapshot(tmp.path()), before);
}

#[test]
fn editing_base_rebuilds_child_but_not_other() {
    let tmp = TempDir::new().unwrap();
    write_source(tmp.path(), "Base.sol", "contract Base {}");
    write_source(
        tmp.path(),
        "Child.sol",
        "import \"./Base.sol\"; contract Child {}",
    );
    write_source(tmp.path(), "Other.sol", "contract Other {}");

    compile_project(&context(tmp.path()), &MockCompiler::new()).unwrap();

    write_source(tmp.path(), "Base.sol", "contract Base { uint x; }");
    let second = MockCompiler::new();
    let result = compile_project(&context(tmp.path()), &second).unwrap();

    assert!(result.success());
    assert_eq!(result.compiled, 2);
    assert_eq!(result.reused, 1);
    assert_eq!(
        second.compiled_files(),
        vec!["Base.sol".to_string(), "Child.sol".to_string()]
    );
}

#[test]
fn editing_a_leaf_rebuilds_only_that_unit() {
    let tmp = TempDir::new().unwrap();
    write_source(tmp.path(), "A.sol", "contract A {}");
    write_source(tmp.path(), "B.sol", "import \"./A.sol\"; contract B {}");

    compile_project(&context(tmp.path()), &MockCompiler::new()).unwrap();

    // B is a leaf of the dependents relation: nothing imports it.
    write_source(tmp.path(), "B.sol", "import \"./A.sol\"; contract B2 {}");
    let second = MockCompiler::new();
    let result = compile_project(&context(tmp.path()), &second).unwrap();

    assert_eq!(result.compiled, 1);
    assert_eq!(second.compiled_files(), vec!["B.sol".to_string()]);
}

#[test]
fn mutual_imports_compile_as_one_unit() {
    let tmp = TempDir::new().unwrap();
    write_source(tmp.path(), "A.sol", "import \"./B.sol\"; contract A {}");
    write_source(tmp.path(), "B.sol", "import \"./A.sol\"; contract B {}");

    let mock = MockCompiler::new();
    let result = compile_project(&context(tmp.path()), &mock).unwrap();

    assert!(result.success());
    assert_eq!(mock.invocations(), 1);
    assert_eq!(
        mock.calls()[0],
        vec!["A.sol".to_string(), "B.sol".to_string()]
    );

    // Editing either member recompiles the pair, once.
    write_source(tmp.path(), "A.sol", "import \"./B.sol\"; contract A2 {}");
    let second = MockCompiler::new();
    compile_project(&context(tmp.path()), &second).unwrap();

    assert_eq!(second.invocations(), 1);
    assert_eq!(
        second.calls()[0],
        vec!["A.sol".to_string(), "B.sol".to_string()]
    );
}

#[test]
fn failure_skips_dependents_but_not_unrelated_units() {
    let tmp = TempDir::new().unwrap();
    write_source(tmp.path(), "A.sol", "contract A {}");
    write_source(tmp.path(), "B.sol", "import \"./A.sol\"; contract B {}");
    write_source(tmp.path(), "C.sol", "import \"./B.sol\"; contract C {}");
    write_source(tmp.path(), "D.sol", "contract D {}");

    let mock = MockCompiler::failing(&["A.sol"]);
    let result = compile_project(&context(tmp.path()), &mock).unwrap();

    assert!(!result.success());
    assert_eq!(result.failed.len(), 3);
    assert_eq!(result.compiled, 1);

    // B and C were never dispatched.
    assert_eq!(
        mock.compiled_files(),
        vec!["A.sol".to_string(), "D.sol".to_string()]
    );

    // Every failure traces back to A's unit.
    let direct = result
        .failed
        .iter()
        .find(|f| f.unit == f.root)
        .expect("A fails directly");
    assert!(result.failed.iter().all(|f| f.root == direct.unit));

    // The compiler's diagnostics are preserved.
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.message.contains("scripted failure")));
}

#[test]
fn failed_units_are_retried_next_build() {
    let tmp = TempDir::new().unwrap();
    write_source(tmp.path(), "A.sol", "contract A {}");
    write_source(tmp.path(), "B.sol", "import \"./A.sol\"; contract B {}");

    let failing = MockCompiler::failing(&["A.sol"]);
    let result = compile_project(&context(tmp.path()), &failing).unwrap();
    assert!(!result.success());

    // Same sources, working compiler: nothing was falsely cached.
    let fixed = MockCompiler::new();
    let result = compile_project(&context(tmp.path()), &fixed).unwrap();
    assert!(result.success());
    assert_eq!(result.compiled, 2);
}

#[test]
fn corrupt_index_recompiles_everything() {
    let tmp = TempDir::new().unwrap();
    write_source(tmp.path(), "A.sol", "contract A {}");

    compile_project(&context(tmp.path()), &MockCompiler::new()).unwrap();
    std::fs::write(tmp.path().join("cache/index"), "not json at all").unwrap();

    let second = MockCompiler::new();
    let result = compile_project(&context(tmp.path()), &second).unwrap();

    assert!(result.success());
    assert_eq!(second.invocations(), 1);

    // The index heals: a third build is cached again.
    let third = MockCompiler::new();
    compile_project(&context(tmp.path()), &third).unwrap();
    assert_eq!(third.invocations(), 0);
}

#[test]
fn deleted_artifacts_force_a_miss() {
    let tmp = TempDir::new().unwrap();
    write_source(tmp.path(), "A.sol", "contract A {}");

    compile_project(&context(tmp.path()), &MockCompiler::new()).unwrap();
    std::fs::remove_dir_all(tmp.path().join("artifacts")).unwrap();

    let second = MockCompiler::new();
    let result = compile_project(&context(tmp.path()), &second).unwrap();

    assert_eq!(second.invocations(), 1);
    assert!(result.artifacts.iter().all(|p| p.exists()));
}

#[test]
fn force_recompiles_despite_valid_cache() {
    let tmp = TempDir::new().unwrap();
    write_source(tmp.path(), "A.sol", "contract A {}");

    compile_project(&context(tmp.path()), &MockCompiler::new()).unwrap();

    let second = MockCompiler::new();
    let ctx = context(tmp.path()).with_force(true);
    let result = compile_project(&ctx, &second).unwrap();

    assert_eq!(second.invocations(), 1);
    assert_eq!(result.compiled, 1);

    // The forced build re-records, so the next one is cached again.
    let third = MockCompiler::new();
    compile_project(&context(tmp.path()), &third).unwrap();
    assert_eq!(third.invocations(), 0);
}

#[test]
fn compiler_version_change_invalidates_the_cache() {
    let tmp = TempDir::new().unwrap();
    write_source(tmp.path(), "A.sol", "contract A {}");

    compile_project(&context(tmp.path()), &MockCompiler::new()).unwrap();

    let mut config = Config::default();
    config.compiler.version = "0.8.24".to_string();
    let ctx = BuildContext::from_config(tmp.path(), &config);

    let second = MockCompiler::new();
    let result = compile_project(&ctx, &second).unwrap();
    assert_eq!(second.invocations(), 1);
    assert_eq!(result.compiled, 1);
}

#[test]
fn unresolved_import_fails_only_its_unit_and_dependents() {
    let tmp = TempDir::new().unwrap();
    write_source(
        tmp.path(),
        "Broken.sol",
        "import \"./Missing.sol\"; contract Broken {}",
    );
    write_source(
        tmp.path(),
        "User.sol",
        "import \"./Broken.sol\"; contract User {}",
    );
    write_source(tmp.path(), "Fine.sol", "contract Fine {}");

    let mock = MockCompiler::new();
    let result = compile_project(&context(tmp.path()), &mock).unwrap();

    assert!(!result.success());
    assert_eq!(result.failed.len(), 2);
    assert_eq!(result.compiled, 1);
    assert_eq!(mock.compiled_files(), vec!["Fine.sol".to_string()]);
    assert!(result
        .failed
        .iter()
        .any(|f| f.error.contains("Missing.sol")));
}

#[test]
fn removed_units_are_pruned_from_the_index() {
    let tmp = TempDir::new().unwrap();
    write_source(tmp.path(), "A.sol", "contract A {}");
    write_source(tmp.path(), "B.sol", "contract B {}");

    compile_project(&context(tmp.path()), &MockCompiler::new()).unwrap();
    std::fs::remove_file(tmp.path().join("contracts/B.sol")).unwrap();

    compile_project(&context(tmp.path()), &MockCompiler::new()).unwrap();

    let index = slipway::CacheIndex::load(&tmp.path().join("cache/index"));
    assert_eq!(index.len(), 1);
}

#[test]
fn pre_cancelled_build_dispatches_nothing() {
    let tmp = TempDir::new().unwrap();
    write_source(tmp.path(), "A.sol", "contract A {}");
    write_source(tmp.path(), "B.sol", "import \"./A.sol\"; contract B {}");

    let mock = MockCompiler::new();
    let cancel = Arc::new(AtomicBool::new(true));
    let result = compile_project_with_cancel(&context(tmp.path()), &mock, cancel).unwrap();

    assert!(!result.success());
    assert_eq!(mock.invocations(), 0);
    assert_eq!(result.compiled, 0);
    assert_eq!(result.skipped.len(), 2);
    assert!(result.failed.is_empty());
}

#[test]
fn cancellation_keeps_finished_units_cached() {
    let tmp = TempDir::new().unwrap();
    write_source(tmp.path(), "A.sol", "contract A {}");
    write_source(tmp.path(), "B.sol", "import \"./A.sol\"; contract B {}");

    // The flag is raised while A compiles; A still finishes and is
    // recorded, B is never dispatched.
    let cancel = Arc::new(AtomicBool::new(false));
    let mock = MockCompiler::cancelling(Arc::clone(&cancel));
    let result = compile_project_with_cancel(&context(tmp.path()), &mock, cancel).unwrap();

    assert!(!result.success());
    assert_eq!(result.compiled, 1);
    assert_eq!(result.skipped.len(), 1);
    assert!(result.failed.is_empty());
    assert_eq!(mock.compiled_files(), vec!["A.sol".to_string()]);

    // Resuming picks up exactly where the cancelled build stopped.
    let second = MockCompiler::new();
    let resumed = compile_project(&context(tmp.path()), &second).unwrap();

    assert!(resumed.success());
    assert_eq!(resumed.reused, 1);
    assert_eq!(second.compiled_files(), vec!["B.sol".to_string()]);
}

#[test]
fn empty_project_builds_successfully() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir(tmp.path().join("contracts")).unwrap();

    let mock = MockCompiler::new();
    let result = compile_project(&context(tmp.path()), &mock).unwrap();

    assert!(result.success());
    assert_eq!(mock.invocations(), 0);
}
