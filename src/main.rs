fn main() {
    #[cfg(feature = "cli")]
    nbtstream::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("nbtstream: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
