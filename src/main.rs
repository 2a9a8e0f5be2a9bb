fn main() {
    if let Err(err) = skylabel::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
