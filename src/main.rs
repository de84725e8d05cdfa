fn main() {
    std::process::exit(ligature::cli::run());
}
