fn main() {
    if let Err(e) = vxfs_recover::cli::run_cli() {
        eprintln!("[!] {}", e);
        if let Some(hint) = e.hint() {
            eprintln!("    hint: {}", hint);
        }
        std::process::exit(1);
    }
}
