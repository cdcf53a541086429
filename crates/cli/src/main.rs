use std::process::ExitCode;

fn main() -> ExitCode {
    dealpulse_cli::run()
}
