pub mod api;
pub mod config;
pub mod director;
pub mod error;
pub mod init;
pub mod linkedin;
pub mod media;
pub mod media_cache;
pub mod scenes;
pub mod scraper;
pub mod script;
pub mod server;

pub use config::Config;
pub use error::{TrailerError, TrailerResult};
pub use server::{AppState, create_router};

/// Installs the global tracing subscriber. `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("profile_trailer=info,tower_http=info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
