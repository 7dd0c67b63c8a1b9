// ==============================================================================
// logging.rs — LOG BACKEND SETUP
// ------------------------------------------------------------------------------
// The library only talks to the `log` facade. The server binary installs an
// env_logger backend once at startup; RUST_LOG overrides the default level.
// ==============================================================================

use std::io::Write;

use env_logger::WriteStyle;
use log::LevelFilter;

pub fn try_init() -> Result<(), log::SetLoggerError> {
    env_logger::builder()
        .format(|buf, record| {
            writeln!(
                buf,
                "[RACENET | {}] {}",
                record.level(),
                record.args()
            )
        })
        .write_style(WriteStyle::Always)
        .filter(None, LevelFilter::Info)
        .parse_default_env()
        .try_init()
}
