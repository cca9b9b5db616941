mod app_state;

pub use app_state::{
    default_minecraft_dir, AppState, MinecraftOptions, NeoforgeOptions, Settings, SETTINGS_FILE,
};
