// Prints `hello` or `world`, depending on which unsynchronized write won.

fn main() -> anyhow::Result<()> {
    hazard_scenarios::cli::run_standalone("weird_thread_graph")
}
