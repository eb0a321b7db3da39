use std::process::ExitCode;

fn main() -> ExitCode {
    mostrador_cli::run()
}
