fn main() -> anyhow::Result<()> {
    hazard_scenarios::cli::run_standalone("signaled_handoff")
}
