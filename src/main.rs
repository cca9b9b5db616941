fn main() {
    std::process::exit(neoforge_updater_lib::run());
}
