fn main() -> anyhow::Result<()> {
    campusdesk::run()?;
    Ok(())
}
