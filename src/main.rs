fn main() {
    std::process::exit(integrate::cli::run());
}
