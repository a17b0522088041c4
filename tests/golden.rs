//! Golden tests for texprune.
//!
//! These tests build small projects on disk, run resolution and reduction
//! end to end, and check the exact bytes of the output tree.

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use texprune::{
    find_main_file, CleanPolicy, CopyMode, DependencyResolver, EdgeKind, FsSourceTree, NodeKind,
    ReduceError, ReduceOptions, ResolveWarning, TreeReducer,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn write(root: &Path, rel: &str, content: impl AsRef<[u8]>) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn read(root: &Path, rel: &str) -> String {
    std::fs::read_to_string(root.join(rel)).unwrap()
}

/// A paper with sections, figures, a bibliography and some dead weight.
fn build_paper() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    write(
        root,
        "main.tex",
        "\\documentclass{article}\n\
         \\usepackage{graphicx}\n\
         % \\input{sections/old}\n\
         \\begin{document}\n\
         \\input{sections/intro}\n\
         \\include{sections/method}\n\
         Results are 100\\% reproducible. % TODO: check\n\
         \\bibliographystyle{plain}\n\
         \\bibliography{refs}\n\
         \\end{document}\n",
    );
    write(root, "sections/intro.tex", "Intro cites \\cite{knuth84}.\n%\\cite{unused}\n");
    write(
        root,
        "sections/method.tex",
        "\\includegraphics[width=\\linewidth]{figures/arch}\n\\citep[p.~3]{lamport94,knuth84}\n",
    );
    write(root, "sections/old.tex", "stale\n");
    write(root, "figures/arch.pdf", b"%PDF-1.4 fake figure\x00\xff".as_slice());
    write(root, "figures/unused.png", [0u8, 1, 2, 3]);
    write(
        root,
        "refs.bib",
        "@book{knuth84,\n  title = {The {\\TeX}book},\n  year = 1984\n}\n\n\
         @book{lamport94, title = {LaTeX}}\n\n\
         @article{unused, title = {Never cited}}\n",
    );
    dir
}

fn clean(src: &Path, out: &Path) -> texprune::CopyReport {
    let tree = Arc::new(FsSourceTree::scan(src).unwrap());
    let resolution = DependencyResolver::new(Arc::clone(&tree), CleanPolicy::default())
        .resolve("main.tex")
        .unwrap();
    TreeReducer::new(tree, CleanPolicy::default())
        .reduce(out, &resolution.reachable, &resolution.warnings, ReduceOptions::default())
        .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// END-TO-END TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_paper_reduces_to_reachable_files() {
    let src = build_paper();
    let out = TempDir::new().unwrap();
    let report = clean(src.path(), out.path());

    let mut written: Vec<&str> = report.files.iter().map(|f| f.path.as_str()).collect();
    written.sort();
    assert_eq!(
        written,
        vec!["figures/arch.pdf", "main.tex", "refs.bib", "sections/intro.tex", "sections/method.tex"]
    );
    assert!(!out.path().join("sections/old.tex").exists());
    assert!(!out.path().join("figures/unused.png").exists());
    assert!(report.is_clean());
}

#[test]
fn test_documents_are_stripped_line_by_line() {
    let src = build_paper();
    let out = TempDir::new().unwrap();
    clean(src.path(), out.path());

    assert_eq!(
        read(out.path(), "main.tex"),
        "\\documentclass{article}\n\
         \\usepackage{graphicx}\n\
         \n\
         \\begin{document}\n\
         \\input{sections/intro}\n\
         \\include{sections/method}\n\
         Results are 100\\% reproducible. \n\
         \\bibliographystyle{plain}\n\
         \\bibliography{refs}\n\
         \\end{document}\n"
    );
    assert_eq!(read(out.path(), "sections/intro.tex"), "Intro cites \\cite{knuth84}.\n\n");
}

#[test]
fn test_assets_are_byte_identical() {
    let src = build_paper();
    let out = TempDir::new().unwrap();
    clean(src.path(), out.path());

    assert_eq!(
        std::fs::read(out.path().join("figures/arch.pdf")).unwrap(),
        std::fs::read(src.path().join("figures/arch.pdf")).unwrap()
    );
}

#[test]
fn test_bibliography_keeps_cited_entries_verbatim() {
    let src = build_paper();
    let out = TempDir::new().unwrap();
    let report = clean(src.path(), out.path());

    assert_eq!(
        read(out.path(), "refs.bib"),
        "@book{knuth84,\n  title = {The {\\TeX}book},\n  year = 1984\n}\n\n@book{lamport94, title = {LaTeX}}\n"
    );
    assert_eq!(
        report.file("refs.bib").unwrap().mode,
        CopyMode::FilteredBibliography { kept: 2, dropped: 1 }
    );
}

#[test]
fn test_bibliography_subset_of_three() {
    let src = TempDir::new().unwrap();
    write(src.path(), "main.tex", "\\cite{a}\\cite{c}\n\\bibliography{refs}\n");
    write(src.path(), "refs.bib", "@misc{a, note={A}}\n@misc{b, note={B}}\n@misc{c, note={C}}\n");
    let out = TempDir::new().unwrap();
    clean(src.path(), out.path());

    let keys: Vec<String> = read(out.path(), "refs.bib")
        .lines()
        .filter_map(|l| l.strip_prefix("@misc{"))
        .map(|l| l.split(',').next().unwrap().to_string())
        .collect();
    assert_eq!(keys, vec!["a", "c"]);
}

// ─────────────────────────────────────────────────────────────────────────────
// DETERMINISM TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_repeated_runs_produce_identical_trees() {
    let src = build_paper();
    let out1 = TempDir::new().unwrap();
    let out2 = TempDir::new().unwrap();

    let r1 = clean(src.path(), out1.path());
    let r2 = clean(src.path(), out2.path());

    assert_eq!(r1.fingerprint, r2.fingerprint);
    assert_eq!(r1.files, r2.files);
    for file in &r1.files {
        assert_eq!(
            std::fs::read(file.path.to_path(out1.path())).unwrap(),
            std::fs::read(file.path.to_path(out2.path())).unwrap(),
            "{} differs between runs",
            file.path
        );
    }
}

#[test]
fn test_policy_change_changes_fingerprint() {
    let src = build_paper();
    let tree = Arc::new(FsSourceTree::scan(src.path()).unwrap());

    let mut policy = CleanPolicy::default();
    policy.graphics_search_dirs.push("plots".to_string());

    let r1 = DependencyResolver::new(Arc::clone(&tree), CleanPolicy::default()).resolve("main.tex").unwrap();
    let r2 = DependencyResolver::new(tree, policy).resolve("main.tex").unwrap();

    assert_eq!(r1.reachable.documents, r2.reachable.documents);
    assert_ne!(r1.reachable.fingerprint(), r2.reachable.fingerprint());
}

#[test]
fn test_dependency_tree_rendering() {
    let src = build_paper();
    let tree = Arc::new(FsSourceTree::scan(src.path()).unwrap());
    let resolution = DependencyResolver::new(tree, CleanPolicy::minimal()).resolve("main.tex").unwrap();

    let rendered = resolution.graph.render_tree();
    assert!(rendered.starts_with("main.tex\n"));
    assert!(rendered.contains("sections/intro.tex"));
    assert!(rendered.contains("figures/arch.pdf"));
}

// ─────────────────────────────────────────────────────────────────────────────
// CORRECTNESS TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_unresolved_reference_still_reduces() {
    let src = TempDir::new().unwrap();
    write(src.path(), "main.tex", "\\input{present}\n\\includegraphics{ghost}\n");
    write(src.path(), "present.tex", "here\n");
    let out = TempDir::new().unwrap();

    let report = clean(src.path(), out.path());
    assert_eq!(report.files_copied(), 2);
    assert_eq!(report.warnings.len(), 1);
    let ResolveWarning::UnresolvedReference { kind, target, line, .. } = &report.warnings[0];
    assert_eq!(*kind, EdgeKind::Graphics);
    assert_eq!(target, "ghost");
    assert_eq!(*line, 2);
    // The directive line is copied even though its target is missing.
    assert_eq!(read(out.path(), "main.tex"), "\\input{present}\n\\includegraphics{ghost}\n");
}

#[test]
fn test_nested_output_directory_is_not_scanned() {
    let src = TempDir::new().unwrap();
    write(src.path(), "main.tex", "\\documentclass{article}\n");
    write(src.path(), "local.sty", "% style\n");
    let out = src.path().join("clean");

    let tree = Arc::new(FsSourceTree::scan_excluding(src.path(), &[out.clone()]).unwrap());
    let resolution = DependencyResolver::new(Arc::clone(&tree), CleanPolicy::default()).resolve("main.tex").unwrap();
    let report = TreeReducer::new(tree, CleanPolicy::default())
        .reduce(&out, &resolution.reachable, &resolution.warnings, ReduceOptions::default())
        .unwrap();

    assert_eq!(report.file("local.sty").unwrap().kind, NodeKind::Support);

    // A second run sees the first run's output only if it is not excluded.
    let rescanned = FsSourceTree::scan_excluding(src.path(), &[out.clone()]).unwrap();
    assert_eq!(rescanned.num_files(), 2);
}

#[test]
fn test_second_run_needs_overwrite() {
    let src = build_paper();
    let out = TempDir::new().unwrap();
    clean(src.path(), out.path());

    let tree = Arc::new(FsSourceTree::scan(src.path()).unwrap());
    let resolution = DependencyResolver::new(Arc::clone(&tree), CleanPolicy::default()).resolve("main.tex").unwrap();
    let reducer = TreeReducer::new(tree, CleanPolicy::default());

    let err = reducer
        .reduce(out.path(), &resolution.reachable, &resolution.warnings, ReduceOptions::default())
        .unwrap_err();
    assert!(matches!(err, ReduceError::OutputDirExists(_)));

    let report = reducer
        .reduce(out.path(), &resolution.reachable, &resolution.warnings, ReduceOptions { overwrite: true })
        .unwrap();
    assert_eq!(report.files_copied(), 5);
}

#[test]
fn test_main_file_discovery_on_disk() {
    let src = build_paper();
    let tree = FsSourceTree::scan(src.path()).unwrap();
    assert_eq!(find_main_file(&tree).unwrap().as_str(), "main.tex");
}

#[test]
fn test_report_serializes_to_json() {
    let src = build_paper();
    let out = TempDir::new().unwrap();
    let report = clean(src.path(), out.path());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["schema_version"], texprune::REPORT_SCHEMA_VERSION);
    assert_eq!(json["files"].as_array().unwrap().len(), 5);
    assert_eq!(json["files"][0]["mode"]["mode"], "stripped");
}
