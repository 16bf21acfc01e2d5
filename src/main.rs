fn main() {
    if let Err(err) = kinship_layout::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
