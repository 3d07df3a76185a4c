use std::process::ExitCode;

fn main() -> ExitCode {
    lockin::run()
}
