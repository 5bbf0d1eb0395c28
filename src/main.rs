fn main() {
    if let Err(err) = showoci_csv_loader::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
