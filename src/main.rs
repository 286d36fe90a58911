fn main() -> anyhow::Result<()> {
    chatdex::cli::run()
}
