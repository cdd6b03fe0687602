use zen_garden::{GardenApp, GardenConfig};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info,wgpu_core=warn,wgpu_hal=warn"),
    )
    .init();

    let config = GardenConfig::from_env();
    log::info!("Loading assets from {}", config.assets.root.display());

    GardenApp::new(config).run()
}
