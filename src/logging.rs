use anyhow::Context as _;

fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "facilito_dl=debug,info",
        _ => "facilito_dl=trace,debug",
    }
}

pub fn init(verbose: u8) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_directive(verbose)))
        .context("build log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}
