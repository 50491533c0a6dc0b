use std::io::Write;
use clap::Parser;
use nl_trainer::flags::Flags;
use nl_trainer::run::run_training_wrapper;

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, level))
        .format(|buf, record| {
            writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args())
        })
        .write_style(env_logger::WriteStyle::Never)
        .init();
}

fn main() -> anyhow::Result<()> {
    let flags = Flags::parse();
    init_logging(flags.debug);
    run_training_wrapper(flags)
}
