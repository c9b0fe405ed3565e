#![cfg(unix)]

use std::fs;
use std::sync::mpsc::channel;
use std::thread;
use std::time::Duration;

use helpers::{current_pid, event, running, Project};
use kumara::error::Error;
use notify::op;

mod helpers;

#[test]
fn startup_watches_tree_and_runs_program() {
    let project = Project::new();
    project.mkdir(".git/objects");
    project.mkdir("internal/store");

    let (mut kumara, _rx) = project.kumara();
    assert_eq!(kumara.discover().unwrap(), 3);

    let registry = kumara.registry();
    assert!(registry.contains(&project.root));
    assert!(registry.contains(&project.path("internal")));
    assert!(registry.contains(&project.path("internal/store")));
    assert!(!registry.contains(&project.path(".git")));
    assert!(!registry.contains(&project.path(".git/objects")));

    kumara.rebuild().unwrap();
    assert!(project.path("kumara-bin").exists());
    assert!(running(current_pid(&kumara)));
}

#[test]
fn source_write_replaces_the_program() {
    let project = Project::new();
    let (mut kumara, _rx) = project.kumara();
    kumara.discover().unwrap();
    kumara.rebuild().unwrap();
    let old = current_pid(&kumara);

    kumara.handle(event(&project.path("main.go"), op::WRITE));

    let new = current_pid(&kumara);
    assert_ne!(old, new);
    assert!(!running(old));
    assert!(running(new));
}

#[test]
fn failed_build_keeps_the_old_program() {
    let project = Project::new();
    let (mut kumara, _rx) = project.kumara();
    kumara.discover().unwrap();
    kumara.rebuild().unwrap();
    let old = current_pid(&kumara);

    project.break_build();
    kumara.handle(event(&project.path("main.go"), op::WRITE));

    assert_eq!(current_pid(&kumara), old);
    assert!(running(old));

    match kumara.rebuild() {
        Err(Error::Build(result)) => {
            assert_eq!(result.output_lossy(), "syntax error line 4\n");
        }
        other => panic!("expected a build failure, got {:?}", other),
    }
    assert!(running(old));

    project.fix_build();
    kumara.handle(event(&project.path("main.go"), op::WRITE));
    assert_ne!(current_pid(&kumara), old);
    assert!(!running(old));
}

#[test]
fn new_directories_are_watched() {
    let project = Project::new();
    let (mut kumara, _rx) = project.kumara();
    kumara.discover().unwrap();

    let sub = project.mkdir("sub");
    assert!(!kumara.observe(event(&sub, op::CREATE)));
    assert!(kumara.registry().contains(&sub));

    let file = sub.join("file.go");
    fs::write(&file, "package sub\n").unwrap();
    assert!(kumara.observe(event(&file, op::WRITE)));
}

#[test]
fn recreated_directories_are_watched_again() {
    let project = Project::new();
    let (mut kumara, rx) = project.kumara();
    kumara.discover().unwrap();

    let sub = project.mkdir("sub");
    kumara.observe(event(&sub, op::CREATE));
    assert!(kumara.registry().contains(&sub));

    fs::remove_dir(&sub).unwrap();
    fs::create_dir(&sub).unwrap();
    kumara.observe(event(&sub, op::CREATE));

    let file = sub.join("file.go");
    fs::write(&file, "package sub\n").unwrap();

    let mut qualified = false;
    while let Ok(raw) = rx.recv_timeout(Duration::from_secs(5)) {
        if raw.path.as_ref() == Some(&file) && kumara.observe(raw) {
            qualified = true;
            break;
        }
    }
    assert!(qualified, "write inside recreated directory never delivered");
}

#[test]
fn nested_directories_created_at_once_are_watched() {
    let project = Project::new();
    let (mut kumara, _rx) = project.kumara();
    kumara.discover().unwrap();

    let deep = project.mkdir("a/b/c");
    kumara.observe(event(&project.path("a"), op::CREATE));

    assert!(kumara.registry().contains(&project.path("a")));
    assert!(kumara.registry().contains(&project.path("a/b")));
    assert!(kumara.registry().contains(&deep));
}

#[test]
fn hidden_directories_are_never_watched() {
    let project = Project::new();
    let (mut kumara, _rx) = project.kumara();
    kumara.discover().unwrap();

    let hidden = project.mkdir(".cache");
    kumara.observe(event(&hidden, op::CREATE));
    assert!(!kumara.registry().contains(&hidden));
}

#[test]
fn chmod_does_not_rebuild() {
    let project = Project::new();
    let (mut kumara, _rx) = project.kumara();
    kumara.discover().unwrap();
    kumara.rebuild().unwrap();
    let old = current_pid(&kumara);

    kumara.handle(event(&project.path("main.go"), op::CHMOD));
    assert_eq!(current_pid(&kumara), old);

    assert!(kumara.observe(event(&project.path("main.go"), op::CREATE | op::CHMOD)));
}

#[test]
fn non_sources_do_not_rebuild() {
    let project = Project::new();
    let (mut kumara, _rx) = project.kumara();
    kumara.discover().unwrap();

    assert!(!kumara.observe(event(&project.path("README.md"), op::WRITE)));
    assert!(!kumara.observe(event(&project.path("kumara-bin"), op::CREATE)));
}

#[test]
fn watcher_errors_are_not_rebuilds() {
    let project = Project::new();
    let (mut kumara, _rx) = project.kumara();

    let raw = kumara::event::RawEvent {
        path: None,
        op: Err(notify::Error::Generic("inotify queue overflow".into())),
        cookie: None,
    };
    assert!(!kumara.observe(raw));
}

#[test]
fn real_edits_arrive_and_qualify() {
    let project = Project::new();
    let (mut kumara, rx) = project.kumara();
    kumara.discover().unwrap();

    fs::write(project.path("handler.go"), "package main\n").unwrap();

    let mut qualified = false;
    while let Ok(raw) = rx.recv_timeout(Duration::from_secs(5)) {
        if kumara.observe(raw) {
            qualified = true;
            break;
        }
    }
    assert!(qualified);
}

#[test]
fn program_dies_with_the_supervisor() {
    let project = Project::new();
    let (mut kumara, _rx) = project.kumara();
    kumara.discover().unwrap();
    kumara.rebuild().unwrap();
    let pid = current_pid(&kumara);

    drop(kumara);
    assert!(!running(pid));
}

#[test]
fn serve_rebuilds_for_every_event_without_debounce() {
    let project = Project::new();
    let (mut kumara, _watched) = project.kumara();

    let (tx, rx) = channel();
    for name in &["main.go", "handler.go", "main.go"] {
        tx.send(event(&project.path(name), op::WRITE)).unwrap();
    }
    tx.send(event(&project.path("README.md"), op::WRITE)).unwrap();
    drop(tx);

    assert!(matches!(kumara.serve(&rx), Err(Error::EventSourceClosed)));
    assert_eq!(project.builds(), 3);
    assert!(running(current_pid(&kumara)));
}

#[test]
fn serve_coalesces_a_burst_within_the_debounce_window() {
    let project = Project::new();
    let (mut kumara, _watched) = project.kumara_with(Some(Duration::from_millis(200)));

    let (tx, rx) = channel();
    for name in &["main.go", "handler.go", "main.go", "util.go"] {
        tx.send(event(&project.path(name), op::WRITE)).unwrap();
    }
    drop(tx);

    assert!(matches!(kumara.serve(&rx), Err(Error::EventSourceClosed)));
    assert_eq!(project.builds(), 1);
    assert!(running(current_pid(&kumara)));
}

#[test]
fn serve_registers_directories_seen_while_debouncing() {
    let project = Project::new();
    let (mut kumara, _watched) = project.kumara_with(Some(Duration::from_millis(200)));
    let sub = project.mkdir("sub");

    let (tx, rx) = channel();
    tx.send(event(&project.path("main.go"), op::WRITE)).unwrap();
    tx.send(event(&sub, op::CREATE)).unwrap();
    drop(tx);

    assert!(matches!(kumara.serve(&rx), Err(Error::EventSourceClosed)));
    assert!(kumara.registry().contains(&sub));
    assert_eq!(project.builds(), 1);
}

#[test]
fn unrelated_writes_do_not_hold_back_a_debounced_rebuild() {
    let project = Project::new();
    let (mut kumara, _watched) = project.kumara_with(Some(Duration::from_millis(200)));

    let (tx, rx) = channel();
    let source = project.path("main.go");
    let log = project.path("app.log");
    let builds = project.path("builds.log");
    let writer = thread::spawn(move || {
        tx.send(event(&source, op::WRITE)).unwrap();
        for _ in 0..30 {
            thread::sleep(Duration::from_millis(50));
            tx.send(event(&log, op::WRITE)).unwrap();
        }
        builds.exists()
    });

    assert!(matches!(kumara.serve(&rx), Err(Error::EventSourceClosed)));
    assert!(writer.join().unwrap(), "no build while app.log kept changing");
    assert_eq!(project.builds(), 1);
}

#[test]
fn serve_stops_when_the_event_source_closes() {
    let project = Project::new();
    let (mut kumara, _watched) = project.kumara();

    let (tx, rx) = channel::<kumara::event::RawEvent>();
    drop(tx);

    assert!(matches!(kumara.serve(&rx), Err(Error::EventSourceClosed)));
    assert_eq!(project.builds(), 0);
    assert!(kumara.supervisor().current().is_none());
}
