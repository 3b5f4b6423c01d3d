use anyhow::Result;

fn main() -> Result<()> {
    notekiosk::cli::run()
}
