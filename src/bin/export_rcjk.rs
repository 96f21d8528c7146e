use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    robocjk_export::cli::run().await?;
    Ok(())
}
