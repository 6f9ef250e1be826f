fn main() -> anyhow::Result<()> {
    c0_rust::run()
}
