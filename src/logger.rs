use env_logger::Builder;
use log::info;
use log::LevelFilter;
use std::io::Write;

// Logger setup; RUST_LOG overrides the Info default.
pub fn setup_logger() {
    let mut builder = Builder::from_default_env();

    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {:<5} {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .filter(None, LevelFilter::Info)
        .init();

    info!("Logger initialized");
}
