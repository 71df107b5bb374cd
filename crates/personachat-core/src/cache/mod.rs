mod directory;
mod settings;

pub use directory::DirectoryCache;
pub use settings::SettingsCache;
