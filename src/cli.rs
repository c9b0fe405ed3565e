use std::time::Duration;

use clap::{App, AppSettings, Arg, ArgMatches};
use log::LevelFilter;

use crate::config::{Config, ConfigBuilder};
use crate::error;

pub fn get_args() -> error::Result<(Config, LevelFilter)> {
    get_args_impl(None::<&[&str]>)
}

pub fn get_args_from<I, T>(from: I) -> error::Result<(Config, LevelFilter)>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    get_args_impl(Some(from))
}

fn get_args_impl<I, T>(from: Option<I>) -> error::Result<(Config, LevelFilter)>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let app = App::new("kumara")
        .version(crate_version!())
        .about("Rebuild and restart a program whenever its sources change")
        .setting(AppSettings::TrailingVarArg)
        .arg(Arg::with_name("build")
                 .help("Build command [default: go build -o <output>]")
                 .multiple(true))
        .arg(Arg::with_name("path")
                 .help("Directory to watch, build and run in [default: .]")
                 .short("w")
                 .long("watch")
                 .takes_value(true)
                 .value_name("dir"))
        .arg(Arg::with_name("extension")
                 .help("Source file extension that triggers a rebuild [default: go]")
                 .short("e")
                 .long("ext")
                 .takes_value(true)
                 .value_name("ext"))
        .arg(Arg::with_name("output")
                 .help("Program the build produces, run after every successful build [default: kumara-bin]")
                 .short("o")
                 .long("output")
                 .takes_value(true)
                 .value_name("name"))
        .arg(Arg::with_name("debounce")
                 .help("Coalesce changes arriving within this many milliseconds into one rebuild")
                 .short("d")
                 .long("debounce")
                 .takes_value(true)
                 .value_name("milliseconds"))
        .arg(Arg::with_name("kill-timeout")
                 .help("How long to wait for the old program to die before giving up on a restart [default: 5000]")
                 .long("kill-timeout")
                 .takes_value(true)
                 .value_name("milliseconds"))
        .arg(Arg::with_name("poll")
                 .help("Forces polling mode")
                 .long("force-poll")
                 .takes_value(true)
                 .value_name("interval"))
        .arg(Arg::with_name("verbose")
                 .help("Print debugging messages to stderr")
                 .short("v")
                 .long("verbose"));

    let args = match from {
        None => app.get_matches(),
        Some(i) => app.get_matches_from(i),
    };

    let mut builder = ConfigBuilder::default();
    builder.root(args.value_of("path").unwrap_or("."));

    if let Some(build) = args.values_of("build") {
        builder.build_command(build.map(str::to_string).collect::<Vec<_>>());
    }

    if let Some(ext) = args.value_of("extension") {
        builder.extension(ext);
    }

    if let Some(output) = args.value_of("output") {
        builder.artifact(output);
    }

    if let Some(debounce) = millis(&args, "debounce") {
        builder.debounce(debounce);
    }

    if let Some(timeout) = millis(&args, "kill-timeout") {
        builder.kill_timeout(timeout);
    }

    if let Some(interval) = millis(&args, "poll") {
        builder.poll(interval);
    }

    let loglevel = if args.is_present("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Ok((builder.build()?, loglevel))
}

fn millis(args: &ArgMatches, name: &str) -> Option<Duration> {
    if args.occurrences_of(name) > 0 {
        Some(Duration::from_millis(
            value_t!(args.value_of(name), u64).unwrap_or_else(|e| e.exit()),
        ))
    } else {
        None
    }
}
