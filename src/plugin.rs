use crate::{
    cache::GpuResourceCache,
    config::{ImageryLayerConfig, SurfaceImageryConfig},
    layer::TiledImageLayer,
    render::FrameStatistics,
    retrieval::{DirectoryImageSource, ImageSource},
};
use bevy::prelude::*;
use bevy_common_assets::ron::RonAssetPlugin;
use std::sync::Arc;

/// The source that imagery layers spawned by the [`SurfaceImageryPlugin`] fetch tiles from.
/// Defaults to the `assets` directory.
#[derive(Resource, Clone, Deref)]
pub struct ImagerySource(pub Arc<dyn ImageSource>);

impl Default for ImagerySource {
    fn default() -> Self {
        Self(Arc::new(DirectoryImageSource::new("assets")))
    }
}

/// Requests a [`TiledImageLayer`] for the entity, built once the config has been loaded.
#[derive(Component, Clone, Debug)]
pub struct ImageryLayerHandle(pub Handle<ImageryLayerConfig>);

/// The plugin for tiled surface imagery.
#[derive(Default)]
pub struct SurfaceImageryPlugin {
    pub config: SurfaceImageryConfig,
}

impl Plugin for SurfaceImageryPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(RonAssetPlugin::<ImageryLayerConfig>::new(&["imagery.ron"]))
            .insert_resource(self.config.clone())
            .insert_resource(GpuResourceCache::new(
                self.config.cache_capacity,
                self.config.cache_low_water,
            ))
            .init_resource::<ImagerySource>()
            .init_resource::<FrameStatistics>()
            .add_systems(First, reset_frame_statistics)
            .add_systems(
                Update,
                (
                    apply_cache_config.run_if(resource_changed::<SurfaceImageryConfig>),
                    spawn_imagery_layers,
                    process_retrievals.after(spawn_imagery_layers),
                ),
            );
    }
}

fn reset_frame_statistics(mut statistics: ResMut<FrameStatistics>) {
    statistics.reset();
}

fn apply_cache_config(config: Res<SurfaceImageryConfig>, mut cache: ResMut<GpuResourceCache>) {
    cache.set_capacity(config.cache_capacity, config.cache_low_water);
}

fn spawn_imagery_layers(
    mut commands: Commands,
    layers: Query<(Entity, &ImageryLayerHandle), Without<TiledImageLayer>>,
    layer_configs: Res<Assets<ImageryLayerConfig>>,
    source: Res<ImagerySource>,
    config: Res<SurfaceImageryConfig>,
) {
    for (entity, handle) in &layers {
        let Some(layer_config) = layer_configs.get(&handle.0) else {
            continue;
        };

        match TiledImageLayer::new(layer_config, source.0.clone(), config.max_fallback_depth) {
            Ok(layer) => {
                commands.entity(entity).insert(layer);
            }
            Err(error) => {
                error!("Invalid imagery layer {}: {error}", layer_config.name);
                commands.entity(entity).remove::<ImageryLayerHandle>();
            }
        }
    }
}

fn process_retrievals(
    time: Res<Time>,
    mut cache: ResMut<GpuResourceCache>,
    mut layers: Query<&mut TiledImageLayer>,
) {
    let now = time.elapsed_secs_f64();

    for mut layer in &mut layers {
        layer.process_retrievals(&mut cache, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        let mut app = App::new();
        app.add_plugins((
            MinimalPlugins,
            AssetPlugin::default(),
            SurfaceImageryPlugin::default(),
        ));
        app
    }

    fn layer_config(num_levels: u32) -> ImageryLayerConfig {
        let mut config =
            ImageryLayerConfig::load_file("assets/layers/blue_marble.imagery.ron").unwrap();
        config.num_levels = num_levels;
        config
    }

    #[test]
    fn layers_are_spawned_from_loaded_configs() {
        let mut app = app();

        let valid = app
            .world_mut()
            .resource_mut::<Assets<ImageryLayerConfig>>()
            .add(layer_config(4));
        let invalid = app
            .world_mut()
            .resource_mut::<Assets<ImageryLayerConfig>>()
            .add(layer_config(0));

        let valid = app.world_mut().spawn(ImageryLayerHandle(valid)).id();
        let invalid = app.world_mut().spawn(ImageryLayerHandle(invalid)).id();
        app.update();

        let layer = app.world().get::<TiledImageLayer>(valid).unwrap();
        assert_eq!(layer.scheme().level_set().level_count(), 4);
        assert!(app.world().get::<TiledImageLayer>(invalid).is_none());
        assert!(app.world().get::<ImageryLayerHandle>(invalid).is_none());
    }

    #[test]
    fn cache_follows_the_config() {
        let mut app = app();
        app.update();

        assert_eq!(
            app.world().resource::<GpuResourceCache>().capacity(),
            SurfaceImageryConfig::default().cache_capacity
        );

        app.world_mut()
            .resource_mut::<SurfaceImageryConfig>()
            .cache_capacity = 1024;
        app.world_mut()
            .resource_mut::<SurfaceImageryConfig>()
            .cache_low_water = 512;
        app.update();

        let cache = app.world().resource::<GpuResourceCache>();
        assert_eq!((cache.capacity(), cache.low_water()), (1024, 512));
    }

    #[test]
    fn frame_statistics_are_reset_every_frame() {
        let mut app = app();
        app.world_mut()
            .resource_mut::<FrameStatistics>()
            .rendered_tile_count = 12;
        app.update();

        assert_eq!(
            *app.world().resource::<FrameStatistics>(),
            FrameStatistics::default()
        );
    }
}
