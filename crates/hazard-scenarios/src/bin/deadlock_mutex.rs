// Never exits: A and B end up blocked on each other's lock.

fn main() -> anyhow::Result<()> {
    hazard_scenarios::cli::run_standalone("deadlock_mutex")
}
