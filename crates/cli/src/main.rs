use std::process::ExitCode;

fn main() -> ExitCode {
    scholar_cli::run()
}
