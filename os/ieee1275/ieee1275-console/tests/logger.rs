use ieee1275_console::ConsoleLogger;
use log::{Level, LevelFilter, Log, Record};
use std::fmt::Write;
use std::sync::Mutex;

static LINES: Mutex<String> = Mutex::new(String::new());

fn capture(args: core::fmt::Arguments<'_>) {
    LINES.lock().unwrap().write_fmt(args).unwrap();
}

#[test]
fn records_are_formatted_and_filtered() {
    let logger = ConsoleLogger::new(LevelFilter::Info, capture);

    logger.log(
        &Record::builder()
            .level(Level::Warn)
            .target("ofdisk")
            .args(format_args!("vscsi node skipped"))
            .build(),
    );
    logger.log(
        &Record::builder()
            .level(Level::Debug)
            .target("ofdisk")
            .args(format_args!("not shown"))
            .build(),
    );

    logger.init().unwrap();
    log::info!(target: "boot", "resolved {}", 3);

    let lines = LINES.lock().unwrap();
    assert_eq!(
        lines.as_str(),
        "[WARN] ofdisk: vscsi node skipped\n[INFO] boot: resolved 3\n"
    );
    assert_eq!(log::max_level(), LevelFilter::Info);
}
