/// Install the fmt subscriber. `RUST_LOG` overrides the default filter.
/// Calling it twice is harmless.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chirp_api=debug,chirp_db=debug".into()),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_twice_is_harmless() {
        super::init();
        super::init();
        tracing::info!("logging initialised");
    }
}
