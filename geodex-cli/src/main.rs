//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    env_logger::init();
    if let Err(err) = geodex_cli::run() {
        eprintln!("geodex: {err}");
        std::process::exit(1);
    }
}
