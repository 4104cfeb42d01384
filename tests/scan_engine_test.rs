//! End-to-end scan passes against real trees on disk.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use todowatch::indexing::ProjectWalker;
use todowatch::{AnnotationStore, ParserRegistry, ScanEngine, ScanError, Settings};

fn engine_in(data_dir: &Path) -> ScanEngine {
    let mut settings = Settings::default();
    settings.data_dir = data_dir.to_path_buf();
    let parsers = ParserRegistry::builtin(&settings);
    ScanEngine::new(Arc::new(settings), parsers)
}

fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn test_todo_inside_function_is_attributed() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    // Comment sits on line 10, inside Foo
    let file = write(
        project.path(),
        "foo.go",
        "package foo\n\nimport \"fmt\"\n\n// Foo prints.\nfunc Foo() {\n\tx := 1\n\tfmt.Println(x)\n\n\t// TODO: fix this\n}\n",
    );

    let engine = engine_in(data.path());
    let report = engine.run_scan(project.path(), "foo").await.unwrap();
    assert_eq!(report.annotations, 1);

    let store = AnnotationStore::load(engine.store_path()).unwrap();
    let annotations = store.project("foo").unwrap();
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0].comment, "TODO: fix this");
    assert_eq!(annotations[0].line_number, 10);
    assert_eq!(annotations[0].function.as_deref(), Some("Foo"));
    assert_eq!(annotations[0].file_path, file);
}

#[tokio::test]
async fn test_concurrent_scans_keep_both_projects() {
    let data = TempDir::new().unwrap();
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();

    for i in 0..20 {
        write(a.path(), &format!("pkg{i}/a{i}.go"), "package a\n\n// TODO: a\n");
        write(b.path(), &format!("mod{i}/b{i}.py"), "# FIXME: b\nx = 1\n");
    }

    let engine = engine_in(data.path());
    let engine_a = engine.clone();
    let engine_b = engine.clone();
    let root_a = a.path().to_path_buf();
    let root_b = b.path().to_path_buf();

    for _ in 0..5 {
        let (ra, rb) = tokio::join!(
            {
                let engine = engine_a.clone();
                let root = root_a.clone();
                tokio::spawn(async move { engine.run_scan(&root, "A").await })
            },
            {
                let engine = engine_b.clone();
                let root = root_b.clone();
                tokio::spawn(async move { engine.run_scan(&root, "B").await })
            }
        );
        ra.unwrap().unwrap();
        rb.unwrap().unwrap();

        let store = AnnotationStore::load(engine.store_path()).unwrap();
        assert_eq!(store.project("A").map(<[_]>::len), Some(20));
        assert_eq!(store.project("B").map(<[_]>::len), Some(20));
    }
}

#[tokio::test]
async fn test_removed_markers_disappear_on_rescan() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let kept = write(project.path(), "kept.rs", "// TODO: keep me\nfn a() {}\n");
    let cleaned = write(
        project.path(),
        "cleaned.rs",
        "fn b() {\n    // FIXME: remove me\n    // TODO: and me\n}\n",
    );

    let engine = engine_in(data.path());
    engine.run_scan(project.path(), "p").await.unwrap();
    let before = AnnotationStore::load(engine.store_path()).unwrap();
    assert_eq!(before.project("p").unwrap().len(), 3);

    fs::write(&cleaned, "fn b() {\n    // all done\n}\n").unwrap();
    let report = engine.run_scan(project.path(), "p").await.unwrap();
    assert_eq!(report.resolved, 2);

    let after = AnnotationStore::load(engine.store_path()).unwrap();
    let annotations = after.project("p").unwrap();
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0].file_path, kept);
    assert!(!annotations.iter().any(|a| a.file_path == cleaned));
}

#[tokio::test]
async fn test_rescan_of_unchanged_tree_is_idempotent() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    write(project.path(), "a.go", "package a\n\n// TODO: one\nfunc A() {\n\t// FIXME: two\n}\n");
    write(project.path(), "web/app.ts", "// TODO: three\nexport const x = 1;\n");

    let engine = engine_in(data.path());
    engine.run_scan(project.path(), "p").await.unwrap();
    let first = AnnotationStore::load(engine.store_path()).unwrap();
    engine.run_scan(project.path(), "p").await.unwrap();
    let second = AnnotationStore::load(engine.store_path()).unwrap();

    let first = first.project("p").unwrap();
    let second = second.project("p").unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(second.len(), 3);
    let keys: HashSet<_> = second.iter().map(|a| a.key()).collect();
    assert_eq!(keys.len(), 3, "no duplicate locations");
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_ignored_and_extensionless_files_contribute_nothing() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    write(project.path(), "main.go", "package main\n// TODO: counted\n");
    write(project.path(), "node_modules/dep/index.js", "// TODO: pruned\n");
    write(project.path(), "vendor/lib/x.go", "package lib\n// TODO: pruned\n");
    write(project.path(), "gen/out.go", "package gen\n// TODO: custom rule\n");
    write(project.path(), "Dockerfile", "# TODO: no extension\n");
    write(project.path(), ".todoignore", "# generated code\n\ngen/\n");

    let engine = engine_in(data.path());
    let report = engine.run_scan(project.path(), "p").await.unwrap();
    assert_eq!(report.annotations, 1);

    let store = AnnotationStore::load(engine.store_path()).unwrap();
    assert_eq!(store.project("p").unwrap()[0].comment, "TODO: counted");
}

#[tokio::test]
async fn test_empty_project_is_stored_as_present() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    write(project.path(), "clean.rs", "fn main() {}\n");

    let engine = engine_in(data.path());
    engine.run_scan(project.path(), "clean").await.unwrap();

    let store = AnnotationStore::load(engine.store_path()).unwrap();
    assert!(store.contains_project("clean"));
    assert!(store.project("clean").unwrap().is_empty());
}

#[tokio::test]
async fn test_scan_all_continues_past_failures() {
    let data = TempDir::new().unwrap();
    let good = TempDir::new().unwrap();
    write(good.path(), "ok.py", "# TODO: fine\n");

    let mut registry = BTreeMap::new();
    registry.insert("missing".to_string(), data.path().join("does-not-exist"));
    registry.insert("good".to_string(), good.path().to_path_buf());

    let engine = engine_in(data.path());
    let outcomes = engine.scan_all(&registry).await.unwrap();
    assert_eq!(outcomes.len(), 2);

    let by_name: BTreeMap<_, _> = outcomes.iter().map(|o| (o.name.as_str(), o)).collect();
    assert!(matches!(
        by_name["missing"].result,
        Err(ScanError::RootUnreadable { .. })
    ));
    assert_eq!(by_name["good"].result.as_ref().unwrap().annotations, 1);

    let store = AnnotationStore::load(engine.store_path()).unwrap();
    assert!(store.contains_project("good"));
    assert!(!store.contains_project("missing"));
}

#[tokio::test]
async fn test_watched_directories_cover_exactly_the_scanned_files() {
    let project = TempDir::new().unwrap();
    let root = project.path();
    write(root, "a.go", "");
    write(root, "src/b.rs", "");
    write(root, "src/deep/c.py", "");
    write(root, "build/out.go", "");
    write(root, "docs/api/gen.ts", "");
    write(root, "docs/guide.js", "");
    write(root, ".todoignore", "api/\n");

    let data = TempDir::new().unwrap();
    let engine = engine_in(data.path());
    let walker = ProjectWalker::new(Arc::new(engine.filter_for(root)));

    let files = walker.files(root);
    let dirs: HashSet<PathBuf> = walker.directories(root).into_iter().collect();

    // Every scanned file lives in a subscribed directory
    for file in &files {
        assert!(dirs.contains(file.parent().unwrap()), "{}", file.display());
    }
    // Every subscribed directory is one the scan descends into
    for dir in &dirs {
        assert!(!engine.filter_for(root).is_pruned(root, dir), "{}", dir.display());
    }
    assert!(!dirs.contains(&root.join("build")));
    assert!(!dirs.contains(&root.join("docs/api")));
    assert!(dirs.contains(&root.join("docs")));
    assert!(!files.iter().any(|f| f.starts_with(root.join("docs/api"))));
}

#[cfg(unix)]
#[tokio::test]
async fn test_non_utf8_file_name_does_not_fail_the_scan() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    write(project.path(), "ok.go", "package ok\n\n// TODO: plain name\n");
    let odd = project.path().join(OsStr::from_bytes(b"bad\xff.go"));
    fs::write(&odd, "package bad\n\n// TODO: odd name\n").unwrap();

    let engine = engine_in(data.path());
    let report = engine.run_scan(project.path(), "odd").await.unwrap();
    assert_eq!(report.annotations, 2);

    let store = AnnotationStore::load(engine.store_path()).unwrap();
    let annotations = store.project("odd").unwrap();
    assert_eq!(annotations.len(), 2);
    assert!(annotations
        .iter()
        .any(|a| a.file_path.to_string_lossy().ends_with("bad\u{fffd}.go")));
}

#[tokio::test]
async fn test_invalid_utf8_content_is_still_scanned() {
    let data = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let mut code = b"package a\n\nfunc F() {\n\ts := \"caf".to_vec();
    code.push(0xe9);
    code.extend_from_slice(b"\"\n\t// TODO: latin1 file\n\t_ = s\n}\n");
    fs::write(project.path().join("latin1.go"), code).unwrap();

    let engine = engine_in(data.path());
    let report = engine.run_scan(project.path(), "latin1").await.unwrap();
    assert_eq!(report.parse_failures, 0);
    assert_eq!(report.files_parsed, 1);
    assert_eq!(report.annotations, 1);
}
