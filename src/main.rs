fn main() -> std::process::ExitCode {
    cross_label_lib::run()
}
