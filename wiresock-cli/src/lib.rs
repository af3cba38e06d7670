mod utils;

pub mod commands;
pub mod logging;
pub mod options;
pub mod test_utils;

pub use commands::connect::{run, run_with};
pub use options::{check_options, Options};
pub use utils::exit::{exit, ExitError};
