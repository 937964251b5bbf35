use anyhow::{bail, Context};
use map_areas::logging;
use map_areas::replay::{self, Script};
use map_areas::settings::Settings;
use std::path::Path;

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(script_path) = args.next() else {
        bail!("usage: map_areas <script.json> [settings.json]");
    };
    let settings_path = args.next().unwrap_or_else(|| "settings.json".to_string());

    let settings = Settings::load(&settings_path)?;
    let _log_guard = logging::init(
        settings.debug_logging,
        settings.log_dir.as_deref().map(Path::new),
    );
    tracing::debug!(?settings, "settings loaded");

    let script = Script::load(&script_path)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build runtime")?;
    let summary = runtime.block_on(replay::replay(&script, &settings))?;

    let json = serde_json::to_string_pretty(&summary).context("serialize summary")?;
    println!("{json}");
    Ok(())
}
