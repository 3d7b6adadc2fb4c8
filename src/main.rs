fn main() {
    if let Err(err) = gstr_recon::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
