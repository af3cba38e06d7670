use anyhow::Result;
use log::LevelFilter;
use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};

/// Log to stderr; stdout is reserved for the bytes received from the remote.
pub fn init(level: LevelFilter) -> Result<()> {
    let encoder = Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S%.3f)} {h({l})} [{M}] {m}{n}"));
    let console = ConsoleAppender::builder().encoder(encoder).target(Target::Stderr).build();

    let builder = Config::builder().appender(Appender::builder().build("console", Box::new(console)));
    let root = Root::builder().appender("console").build(level);

    let config = builder.build(root)?;

    log4rs::init_config(config)?;

    Ok(())
}
