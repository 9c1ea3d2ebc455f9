use std::process::ExitCode;

fn main() -> ExitCode {
    ansible_self_service_lib::run()
}
