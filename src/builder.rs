use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use crate::error::{Error, Result};

/// Outcome of one run of the build command.
#[derive(Debug)]
pub struct BuildResult {
    status: ExitStatus,
    output: Vec<u8>,
}

impl BuildResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub const fn status(&self) -> ExitStatus {
        self.status
    }

    /// Stdout and stderr of the build, interleaved as they were written.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn output_lossy(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

/// Runs the build command, one build at a time.
#[derive(Clone, Debug)]
pub struct Builder {
    cmd: Vec<String>,
    cwd: PathBuf,
}

impl Builder {
    pub fn new(cmd: &[String], cwd: &Path) -> Self {
        Self {
            cmd: cmd.to_vec(),
            cwd: cwd.to_path_buf(),
        }
    }

    pub fn command_line(&self) -> String {
        self.cmd.join(" ")
    }

    /// Builds the program, blocking until the command exits.
    ///
    /// A non-zero exit is logged with the full build output and returned as
    /// [`Error::Build`].
    pub fn build(&self) -> Result<BuildResult> {
        info!("Building...");
        debug!("Running `{}` in {}", self.command_line(), self.cwd.display());

        let result = self
            .run()
            .map_err(|err| Error::BuildSpawn(self.command_line(), err))?;

        if result.success() {
            if !result.output.is_empty() {
                debug!("Build output:\n{}", result.output_lossy());
            }
            info!("Build succeeded");
            Ok(result)
        } else {
            error!("{}", result.output_lossy());
            Err(Error::Build(result))
        }
    }

    fn run(&self) -> io::Result<BuildResult> {
        let (head, tail) = self
            .cmd
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "build command is empty"))?;

        let (mut reader, writer) = io::pipe()?;

        // The command holds the write ends until it's dropped, which has to
        // happen before reading or the read never sees EOF.
        let mut child = {
            let mut command = Command::new(head);
            command
                .args(tail)
                .current_dir(&self.cwd)
                .stdin(Stdio::null())
                .stdout(writer.try_clone()?)
                .stderr(writer);

            #[cfg(unix)]
            crate::signal::reset_mask(&mut command);

            command.spawn()?
        };

        let mut output = Vec::new();
        let read = reader.read_to_end(&mut output);
        let status = child.wait()?;
        read?;

        Ok(BuildResult { status, output })
    }
}
