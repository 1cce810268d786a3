fn main() -> anyhow::Result<()> {
    cloud_kitchen_lib::run()
}
