fn main() {
    if let Err(err) = nightmap_renderer::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
