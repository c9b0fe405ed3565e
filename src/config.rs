//! Configuration for kumara.
//!
//! The [`Config`] struct is not constructable, use [`ConfigBuilder`].
//!
//! # Examples
//!
//! ```
//! # use kumara::config::ConfigBuilder;
//! let config = ConfigBuilder::default()
//!     .root(".")
//!     .build()
//!     .expect("mission failed");
//!
//! assert_eq!(config.build_command, vec!["go", "build", "-o", "kumara-bin"]);
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Name of the built program when nothing else is configured.
pub const DEFAULT_ARTIFACT: &str = "kumara-bin";

/// Suffix of the source files that trigger a rebuild when nothing else is configured.
pub const DEFAULT_EXTENSION: &str = "go";

/// Arguments to the supervisor
#[derive(Builder, Clone, Debug)]
#[builder(setter(into))]
#[builder(build_fn(validate = "Self::validate"))]
#[non_exhaustive]
pub struct Config {
    /// Directory tree to watch. Builds and the program run from here.
    pub root: PathBuf,
    /// Program produced by the build, relative to `root`.
    #[builder(default = "PathBuf::from(DEFAULT_ARTIFACT)")]
    pub artifact: PathBuf,
    /// Build command in popen3 format (first program, rest arguments).
    #[builder(default = "self.default_build_command()")]
    pub build_command: Vec<String>,
    /// Source file extension, without the dot.
    #[builder(default = "DEFAULT_EXTENSION.into()")]
    pub extension: String,
    /// Coalesce events arriving within this window into a single rebuild.
    #[builder(setter(into, strip_option), default)]
    pub debounce: Option<Duration>,
    /// How long a killed program gets to be reaped before restart gives up.
    #[builder(default = "Duration::from_secs(5)")]
    pub kill_timeout: Duration,
    /// Force using the polling backend at this interval.
    #[builder(setter(into, strip_option), default)]
    pub poll: Option<Duration>,
}

impl ConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.build_command.as_ref().map_or(false, Vec::is_empty) {
            return Err("build command must not be empty".into());
        }

        if let Some(ext) = &self.extension {
            if ext.trim_start_matches('.').is_empty() {
                return Err("extension must not be empty".into());
            }
        }

        if let Some(artifact) = &self.artifact {
            if artifact.as_os_str().is_empty() {
                return Err("artifact must not be empty".into());
            }
        }

        Ok(())
    }

    fn default_build_command(&self) -> Vec<String> {
        let artifact = self
            .artifact
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_ARTIFACT));

        vec![
            "go".into(),
            "build".into(),
            "-o".into(),
            artifact.to_string_lossy().into_owned(),
        ]
    }
}

impl Config {
    /// The extension with any leading dot removed.
    pub fn source_extension(&self) -> &str {
        self.extension.trim_start_matches('.')
    }
}
