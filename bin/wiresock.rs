use clap::Parser;
use wiresock_cli::{check_options, exit, logging, run, ExitError, Options};

#[tokio::main]
async fn main() {
    let mut opts: Options = Parser::parse();

    let loaded = opts.try_load_from_file();

    if let Err(err) = logging::init(opts.log_level()) {
        eprintln!("fail to initialize logging due to: {}", err);
    }

    if let Err(err) = loaded.and_then(|_| check_options(&opts)) {
        log::error!("{}", err);
        exit(ExitError::ArgumentsError);
    }

    if let Err(err) = run(opts).await {
        log::error!("{:#}", err);
        exit(ExitError::from(&err));
    }
}
