/// Adapters for the external programs and APIs the daemon drives
pub mod player;
pub mod resolver;
pub mod weather;

pub use player::MpvPlayer;
pub use resolver::YtDlpResolver;
pub use weather::OpenWeatherSource;
