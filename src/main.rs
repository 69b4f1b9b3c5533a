fn main() -> std::process::ExitCode {
    xtool::run()
}
