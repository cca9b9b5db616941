// ─── NeoForge Updater Core ───
// Moves a vanilla Minecraft Launcher profile onto the newest NeoForge release.
//
// Architecture:
//   core/
//     version/    Latest release lookup
//     maven/      Coordinates and artifact URLs
//     downloader/ Installer jar cache + streaming download
//     java/       Java executable resolution
//     loaders/    Installer process runner
//     profiles/   launcher_profiles.json model, backup, atomic patch
//     pipeline/   Stage state machine + progress events
//     state/      settings.json + component wiring

pub mod downloader;
pub mod error;
pub mod http;
pub mod java;
pub mod loaders;
pub mod maven;
pub mod pipeline;
pub mod profiles;
pub mod state;
pub mod version;
