// Worker count defaults to 2; set HAZARD_SMOKE_THREADS when building to change it.

fn main() -> anyhow::Result<()> {
    hazard_scenarios::cli::run_standalone("smoke_test")
}
