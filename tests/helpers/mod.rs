#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;

use kumara::config::ConfigBuilder;
use kumara::event::RawEvent;
use kumara::run::Kumara;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use notify::op::Op;
use tempfile::TempDir;

/// Builds `kumara-bin` unless a file called `broken` exists next to it.
/// Every attempt leaves a line in `builds.log`.
const BUILD_SCRIPT: &str = r#"#!/bin/sh
echo build >> builds.log
if [ -e broken ]; then
    echo "syntax error line 4" >&2
    exit 1
fi
cat > kumara-bin.tmp <<'BIN'
#!/bin/sh
echo "running as $$"
exec sleep 30
BIN
chmod +x kumara-bin.tmp
mv kumara-bin.tmp kumara-bin
echo built
"#;

pub struct Project {
    pub dir: TempDir,
    pub root: PathBuf,
}

impl Project {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().canonicalize().expect("canonicalize tempdir");
        let script = root.join("build.sh");
        fs::write(&script, BUILD_SCRIPT).expect("write build script");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");
        fs::write(root.join("main.go"), "package main\n").expect("write main.go");
        Self { dir, root }
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn mkdir(&self, rel: &str) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(&path).expect("mkdir");
        path
    }

    pub fn break_build(&self) {
        fs::write(self.path("broken"), "").expect("write marker");
    }

    pub fn fix_build(&self) {
        fs::remove_file(self.path("broken")).expect("remove marker");
    }

    /// How many times the build has run so far.
    pub fn builds(&self) -> usize {
        fs::read_to_string(self.path("builds.log"))
            .map(|log| log.lines().count())
            .unwrap_or(0)
    }

    pub fn kumara(&self) -> (Kumara, Receiver<RawEvent>) {
        self.kumara_with(None)
    }

    pub fn kumara_with(&self, debounce: Option<Duration>) -> (Kumara, Receiver<RawEvent>) {
        let mut builder = ConfigBuilder::default();
        builder
            .root(&self.root)
            .build_command(vec!["sh".to_string(), "build.sh".to_string()])
            .kill_timeout(Duration::from_secs(5));
        if let Some(window) = debounce {
            builder.debounce(window);
        }
        let config = builder.build().expect("config");

        let (tx, rx) = channel();
        let kumara = Kumara::new(&config, tx).expect("kumara");
        (kumara, rx)
    }
}

pub fn event(path: &Path, op: Op) -> RawEvent {
    RawEvent {
        path: Some(path.to_path_buf()),
        op: Ok(op),
        cookie: None,
    }
}

pub fn current_pid(kumara: &Kumara) -> u32 {
    kumara
        .supervisor()
        .current()
        .expect("no process running")
        .pid()
}

/// Zombies count as dead.
pub fn running(pid: u32) -> bool {
    if kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }

    match fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .map_or(true, |rest| !rest.trim_start().starts_with('Z')),
        Err(_) => true,
    }
}
