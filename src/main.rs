fn main() {
    if let Err(err) = pulsepacer_lib::run() {
        eprintln!("pulsepacer: {err:#}");
        std::process::exit(1);
    }
}
