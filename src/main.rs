use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches = yum_solver::cli::command().try_get_matches();
    let matches = match matches {
        Ok(m) => m,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    match yum_solver::cli::run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(yum_solver::cli::exit_code_for(&err) as u8)
        }
    }
}
