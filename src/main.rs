fn main() {
    if let Err(e) = pinveil::app::run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
