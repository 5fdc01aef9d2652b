//! Logger setup shared by the binary and tests.

use std::io::Write;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use log::LevelFilter;

/// Map `-v` repetitions to a level; `RUST_LOG` still wins when set.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the process logger. Safe to call more than once.
pub fn init(verbosity: u8) {
    let _ = env_logger::Builder::new()
        .filter_level(level_for(verbosity))
        .parse_default_env()
        .format(|buf, record| {
            let ts = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or(0);
            let current = thread::current();
            let thread_name = current.name().unwrap_or("unnamed");
            writeln!(buf, "[{ts}ms][{thread_name}] {} {}", record.level(), record.args())
        })
        .try_init();
}
