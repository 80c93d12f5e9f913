fn main() -> anyhow::Result<()> {
    hazard_scenarios::cli::run_standalone("livelock")
}
