use std::io::Write;

use clap::{CommandFactory, Parser};

use nav_fusion_rs::{Args, Config, Engine, NavError};

fn main() {
    init_logger();
    log::info!("software started");

    let code = match run() {
        Ok(()) => 0,
        Err(err) => {
            let code = err.exit_code();
            log::error!("program exit with error code: {code} - {err}");
            code
        }
    };
    std::process::exit(code);
}

fn run() -> Result<(), NavError> {
    let args = Args::try_parse().map_err(|err| {
        let _ = err.print();
        NavError::InconsistentInputs("could not parse command line".into())
    })?;

    if args.help {
        let _ = Args::command().print_help();
        return Err(NavError::HelpRequested);
    }

    let cfg = Config::from_args(args)?;
    Engine::new(cfg)?.run()
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] - {}: {}",
                chrono::Local::now().format("%a %b %e %T %Y"),
                record.level(),
                record.args()
            )
        })
        .init();
}
