fn main() -> Result<(), anyhow::Error> {
    stratagraph::run()
}
