use std::process::ExitCode;

fn main() -> ExitCode {
    procflow_cli::run()
}
