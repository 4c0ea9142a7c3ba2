fn main() {
    if let Err(e) = recovery_assistant_lib::run() {
        eprintln!("recovery-assistant: {e}");
        std::process::exit(1);
    }
}
