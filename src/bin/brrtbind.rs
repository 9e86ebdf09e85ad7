use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    brrtbind::cli::run_cli()
}
