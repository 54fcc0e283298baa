use tripboard::{Config, run};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    config.validate()?;

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();

    // worker_threads == 0 leaves the pool size to the runtime.
    if config.general.worker_threads > 0 {
        builder.worker_threads(config.general.worker_threads);
    }

    builder.build()?.block_on(run(config))
}
