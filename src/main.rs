use anyhow::Context;

use libris_app::modules::{self, AppDeps};
use libris_kernel::settings::Settings;
use libris_kernel::{InitCtx, ModuleRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load libris settings")?;
    libris_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        "libris-app bootstrap starting"
    );

    let deps = AppDeps::from_settings(&settings);
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, &deps);

    let ctx = InitCtx {
        settings: &settings,
    };
    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;

    libris_http::start_server(&registry, &settings).await?;

    registry.stop_modules().await?;
    tracing::info!("libris-app shutdown complete");
    Ok(())
}
