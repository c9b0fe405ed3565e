use std::io::Write;

use kumara::{cli, error::Result, run};

fn main() -> Result<()> {
    let (config, loglevel) = cli::get_args()?;

    env_logger::Builder::new()
        .format(|buf, r| writeln!(buf, "*** {}", r.args()))
        .filter(None, loglevel)
        .init();

    run(config)
}
