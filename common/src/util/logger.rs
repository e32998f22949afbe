use std::io::Write;

/// Installs the process logger. `RUST_LOG` overrides the default `info` level.
pub fn init() {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{:<5} {}] {}",
            record.level(),
            record.target(),
            record.args()
        )
    });
    // a second init (tests, embedding hosts) keeps the first logger
    let _ = builder.try_init();
}
