// Never exits: both roles wait on a semaphore the other would post.

fn main() -> anyhow::Result<()> {
    hazard_scenarios::cli::run_standalone("deadlock_sem")
}
