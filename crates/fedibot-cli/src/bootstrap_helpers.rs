use std::path::PathBuf;

use tracing_subscriber::{filter::LevelFilter, EnvFilter};

pub(crate) fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

/// Loads `.env` from the working directory; a missing file is not an error.
///
/// Runs before tracing is installed so `RUST_LOG` can come from the file,
/// which is why the outcome is returned instead of logged here.
pub(crate) fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(error) if error.not_found() => Ok(None),
        Err(error) => Err(error),
    }
}
