use crate::{
    addressing::{SchemeTileFactory, ScratchBuffer, TileAddressingScheme},
    cache::GpuResourceCache,
    config::ImageryLayerConfig,
    error::ConfigurationError,
    layer::{FallbackTexture, ImageTile},
    math::{Globe, Sector},
    render::{DrawContext, SurfaceTileRenderer},
    retrieval::{ImageSource, RetrievalRequest, TileRetriever},
    tiling::{GeometryStamp, SubdivisionCache, Tile, TileFactory},
};
use bevy::prelude::*;
use std::sync::Arc;

/// Tiles closer to the poles than this latitude are refined more eagerly.
const POLAR_LATITUDE: f64 = 75.0;
const POLAR_DETAIL_BOOST: f64 = 1.2;

/// An imagery layer backed by a tile pyramid.
///
/// Every frame the layer walks its quadtree from the top-level tiles, subdividing where the
/// tiles' texels are too coarse for the viewing distance, requests the textures of the
/// selected tiles and draws them with the [`SurfaceTileRenderer`].
#[derive(Component)]
pub struct TiledImageLayer {
    pub name: String,
    pub enabled: bool,
    pub opacity: f32,
    pub detail_control: f64,
    scheme: TileAddressingScheme,
    retriever: TileRetriever,
    top_level_tiles: Arc<[Tile]>,
    subdivision_cache: SubdivisionCache,
    current_tiles: Vec<ImageTile>,
    stamp: Option<GeometryStamp>,
    scratch: ScratchBuffer,
    max_fallback_depth: usize,
}

impl TiledImageLayer {
    pub fn new(
        config: &ImageryLayerConfig,
        source: Arc<dyn ImageSource>,
        max_fallback_depth: u32,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            name: config.name.clone(),
            enabled: true,
            opacity: config.opacity,
            detail_control: config.detail_control,
            scheme: config.addressing_scheme()?,
            retriever: TileRetriever::new(source, &config.retrieval),
            top_level_tiles: Vec::new().into(),
            subdivision_cache: SubdivisionCache::default(),
            current_tiles: Vec::new(),
            stamp: None,
            scratch: ScratchBuffer::default(),
            max_fallback_depth: max_fallback_depth as usize,
        })
    }

    pub fn scheme(&self) -> &TileAddressingScheme {
        &self.scheme
    }

    pub fn top_level_tiles(&self) -> &[Tile] {
        &self.top_level_tiles
    }

    pub fn subdivision_cache(&self) -> &SubdivisionCache {
        &self.subdivision_cache
    }

    /// The tiles selected by the latest call to [`TiledImageLayer::render`].
    pub fn current_tiles(&self) -> &[ImageTile] {
        &self.current_tiles
    }

    pub fn pending_retrievals(&self) -> usize {
        self.retriever.pending_count()
    }

    /// Moves the images fetched so far into the cache.
    pub fn process_retrievals(&mut self, cache: &mut GpuResourceCache, now: f64) -> usize {
        self.retriever
            .process_completed(&self.scheme, cache, &mut self.scratch, now)
    }

    /// Selects, requests and draws the tiles for the frame. Returns the number of draws.
    pub fn render(&mut self, dc: &mut DrawContext) -> u32 {
        if !self.enabled || dc.terrain.is_none() {
            return 0;
        }

        self.process_retrievals(dc.gpu_resource_cache, dc.timestamp);
        self.assemble_tiles(dc);

        if self.current_tiles.is_empty() {
            return 0;
        }

        SurfaceTileRenderer::render_tiles(
            dc,
            &self.current_tiles,
            self.opacity,
            self.opacity < 1.0,
        )
    }

    fn assemble_tiles(&mut self, dc: &mut DrawContext) {
        let stamp = GeometryStamp::new(dc.globe, dc.vertical_exaggeration);

        if self.stamp != Some(stamp) {
            self.create_top_level_tiles(dc.globe, dc.vertical_exaggeration);
            self.subdivision_cache.clear();
            self.stamp = Some(stamp);
        }

        self.retriever.supersede_pending();
        self.current_tiles.clear();

        // no level finer than a pixel at the nearest possible distance can be resolved
        let finest_level = {
            let altitude = dc.eye_altitude().max(1.0);
            let texel_size = dc.pixel_size_at_distance(altitude) / dc.globe.equatorial_radius();
            self.scheme
                .level_set()
                .level_for_texel_size(texel_size)
                .level_number
        };

        let top_level_tiles = self.top_level_tiles.clone();

        // preload the top level, so every tile has an ancestor to fall back on
        for tile in top_level_tiles.iter() {
            let cache_key = ImageTile::cache_key(&self.name, tile);

            if !dc.gpu_resource_cache.contains_key(&cache_key) {
                self.retrieve(dc, tile, cache_key);
            }
        }

        let visible_sector = dc.visible_sector;
        let mut ancestors = Vec::new();

        for tile in top_level_tiles
            .iter()
            .filter(|tile| tile.sector.intersects(&visible_sector))
        {
            self.add_tile_or_descendants(dc, tile, &mut ancestors, finest_level);
        }
    }

    fn create_top_level_tiles(&mut self, globe: &Globe, vertical_exaggeration: f64) {
        let factory = SchemeTileFactory {
            scheme: &self.scheme,
            globe,
            vertical_exaggeration,
        };

        let level = *self.scheme.level_set().first_level();
        let (rows, columns) = factory.matrix_dimensions(&level);

        self.top_level_tiles = (0..rows)
            .flat_map(|row| (0..columns).map(move |column| (row, column)))
            .map(|(row, column)| factory.create_tile(&level, row, column))
            .collect();
    }

    fn add_tile_or_descendants(
        &mut self,
        dc: &mut DrawContext,
        tile: &Tile,
        ancestors: &mut Vec<FallbackTexture>,
        finest_level: u32,
    ) {
        dc.frame_statistics.visited_tile_count += 1;

        let level_number = tile.level.level_number;
        let detail_factor = self.detail_factor(&tile.sector);

        let child_level = self
            .scheme
            .level_set()
            .level(level_number + 1)
            .copied()
            .filter(|_| {
                level_number < finest_level
                    && tile.must_subdivide(dc.globe, dc.eye_point, detail_factor)
            });

        let Some(child_level) = child_level else {
            self.add_tile(dc, tile, ancestors);
            return;
        };

        let factory = SchemeTileFactory {
            scheme: &self.scheme,
            globe: dc.globe,
            vertical_exaggeration: dc.vertical_exaggeration,
        };
        let children =
            tile.subdivide_to_cache(&child_level, &factory, &mut self.subdivision_cache);
        let (rows, columns) = factory.matrix_dimensions(&child_level);

        let visible_sector = dc.visible_sector;

        ancestors.push(FallbackTexture {
            cache_key: ImageTile::cache_key(&self.name, tile),
            sector: tile.sector,
        });

        for child in children.iter().filter(|child| {
            child.row < rows && child.column < columns && child.sector.intersects(&visible_sector)
        }) {
            self.add_tile_or_descendants(dc, child, ancestors, finest_level);
        }

        ancestors.pop();
    }

    fn add_tile(&mut self, dc: &mut DrawContext, tile: &Tile, ancestors: &[FallbackTexture]) {
        let cache_key = ImageTile::cache_key(&self.name, tile);
        let mut image_tile = ImageTile::new(tile.clone(), cache_key.clone());

        if !dc.gpu_resource_cache.contains_key(&cache_key) {
            self.retrieve(dc, tile, cache_key);

            image_tile.fallbacks = ancestors
                .iter()
                .rev()
                .filter(|ancestor| dc.gpu_resource_cache.contains_key(&ancestor.cache_key))
                .take(self.max_fallback_depth)
                .cloned()
                .collect();
        }

        self.current_tiles.push(image_tile);
    }

    fn retrieve(&mut self, dc: &mut DrawContext, tile: &Tile, cache_key: String) {
        let request = RetrievalRequest {
            cache_key,
            url: self.scheme.url_for_tile(&tile.level, tile.key),
            sector: tile.sector,
        };

        if self.retriever.request(request, dc.timestamp) {
            dc.frame_statistics.retrieval_request_count += 1;
        }
    }

    fn detail_factor(&self, sector: &Sector) -> f64 {
        if sector.min_latitude >= POLAR_LATITUDE || sector.max_latitude <= -POLAR_LATITUDE {
            self.detail_control * POLAR_DETAIL_BOOST
        } else {
            self.detail_control
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        render::{recording::RecordingGraphics, FrameStatistics, Terrain},
        tiling::TileKey,
    };
    use bevy::{
        math::{DVec3, UVec2},
        tasks::{AsyncComputeTaskPool, TaskPool},
    };
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::{
        io::Cursor,
        thread,
        time::{Duration, Instant},
    };

    struct SolidSource {
        png: Vec<u8>,
    }

    impl ImageSource for SolidSource {
        fn fetch(&self, _url: &str) -> anyhow::Result<Vec<u8>> {
            Ok(self.png.clone())
        }
    }

    fn layer() -> TiledImageLayer {
        AsyncComputeTaskPool::get_or_init(TaskPool::new);

        let config: ImageryLayerConfig = ron::from_str(
            r#"(
                name: "test",
                level_zero_delta: (latitude: 90.0, longitude: 90.0),
                num_levels: 3,
                tile_width: 8,
                tile_height: 8,
                scheme: Geodetic(url_template: "{level}/{row}/{column}.png"),
            )"#,
        )
        .unwrap();

        let mut png = Vec::new();
        RgbaImage::from_pixel(8, 8, Rgba([0, 0, 255, 255]))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        TiledImageLayer::new(&config, Arc::new(SolidSource { png }), 8).unwrap()
    }

    struct Scene {
        globe: Globe,
        terrain: Terrain,
        cache: GpuResourceCache,
        eye_point: DVec3,
        vertical_exaggeration: f64,
        field_of_view: f64,
        viewport: UVec2,
        visible_sector: Sector,
    }

    impl Scene {
        fn new(altitude: f64) -> Self {
            let globe = Globe::sphere(1000.0).unwrap();
            let eye_point = globe.compute_point_from_position(45.0, 45.0, altitude);

            Self {
                globe,
                terrain: Terrain::uniform(Sector::FULL_SPHERE, 1, 1),
                cache: GpuResourceCache::new(1 << 24, 1 << 24),
                eye_point,
                vertical_exaggeration: 1.0,
                field_of_view: 45f64.to_radians(),
                viewport: UVec2::new(800, 600),
                visible_sector: Sector::FULL_SPHERE,
            }
        }

        fn render(&mut self, layer: &mut TiledImageLayer) -> (u32, FrameStatistics) {
            let mut graphics = RecordingGraphics::default();
            let mut statistics = FrameStatistics::default();
            let mut dc = DrawContext {
                globe: &self.globe,
                eye_point: self.eye_point,
                vertical_exaggeration: self.vertical_exaggeration,
                field_of_view: self.field_of_view,
                viewport: self.viewport,
                visible_sector: self.visible_sector,
                terrain: Some(&self.terrain),
                timestamp: 0.0,
                gpu_resource_cache: &mut self.cache,
                graphics: &mut graphics,
                frame_statistics: &mut statistics,
            };

            let draws = layer.render(&mut dc);
            assert_eq!(draws as usize, graphics.draws());
            (draws, statistics)
        }

        fn drain(&mut self, layer: &mut TiledImageLayer) {
            let deadline = Instant::now() + Duration::from_secs(10);

            while layer.pending_retrievals() > 0 && Instant::now() < deadline {
                layer.process_retrievals(&mut self.cache, 0.0);
                thread::sleep(Duration::from_millis(1));
            }
        }
    }

    fn levels(layer: &TiledImageLayer) -> Vec<u32> {
        layer
            .current_tiles()
            .iter()
            .map(|image_tile| image_tile.tile.level.level_number)
            .collect()
    }

    #[test]
    fn distant_views_use_the_top_level() {
        let mut layer = layer();
        let mut scene = Scene::new(1e6);

        let (draws, statistics) = scene.render(&mut layer);
        assert_eq!(draws, 0);
        assert_eq!(layer.top_level_tiles().len(), 8);
        assert_eq!(levels(&layer), vec![0; 8]);
        assert_eq!(statistics.retrieval_request_count, 8);
        assert_eq!(statistics.visited_tile_count, 8);

        scene.drain(&mut layer);
        let (draws, statistics) = scene.render(&mut layer);
        assert_eq!(draws, 8);
        assert_eq!(statistics.rendered_tile_count, 8);
        assert_eq!(statistics.texture_bind_count, 8);
        assert_eq!(statistics.retrieval_request_count, 0);
    }

    #[test]
    fn close_views_fall_back_to_ancestors() {
        let mut layer = layer();
        let mut scene = Scene::new(500.0);

        let (draws, _) = scene.render(&mut layer);
        assert_eq!(draws, 0);
        assert!(levels(&layer).iter().all(|&level| level == 2));

        // only the preloaded top level has arrived
        scene.drain(&mut layer);
        let (draws, statistics) = scene.render(&mut layer);

        assert_eq!(draws as usize, layer.current_tiles().len());
        assert_eq!(statistics.retrieval_request_count, 8);
        for image_tile in layer.current_tiles() {
            let root = TileKey::new(
                0,
                image_tile.tile.row / 4,
                image_tile.tile.column / 4,
            );
            assert_eq!(
                image_tile.fallbacks[0].cache_key,
                format!("ImageTile:{root},test")
            );
        }
    }

    #[test]
    fn refinement_stops_at_the_resolvable_level() {
        let mut layer = layer();
        let mut scene = Scene::new(500.0);
        scene.field_of_view = 3.0;
        scene.viewport = UVec2::new(1, 1);

        scene.render(&mut layer);
        assert_eq!(levels(&layer), vec![0; 8]);
    }

    #[test]
    fn invisible_tiles_are_skipped() {
        let mut layer = layer();
        let mut scene = Scene::new(1e6);
        scene.visible_sector = Sector::new(10.0, 20.0, 10.0, 20.0);

        let (_, statistics) = scene.render(&mut layer);
        assert_eq!(layer.current_tiles().len(), 1);
        assert_eq!(layer.current_tiles()[0].tile.key, TileKey::new(0, 1, 2));
        // the invisible top level tiles are still preloaded
        assert_eq!(statistics.retrieval_request_count, 8);
    }

    #[test]
    fn changed_exaggeration_rebuilds_geometry() {
        let mut layer = layer();
        let mut scene = Scene::new(500.0);

        scene.render(&mut layer);
        assert!(!layer.subdivision_cache().is_empty());

        scene.vertical_exaggeration = 2.0;
        scene.render(&mut layer);

        assert!(layer
            .top_level_tiles()
            .iter()
            .all(|tile| tile.stamp.vertical_exaggeration == 2.0));
        assert!(layer
            .subdivision_cache()
            .values()
            .all(|children| children[0].stamp.vertical_exaggeration == 2.0));
    }

    #[test]
    fn polar_tiles_get_more_detail() {
        let layer = layer();

        assert_eq!(
            layer.detail_factor(&Sector::new(75.0, 90.0, 0.0, 10.0)),
            1.75 * 1.2
        );
        assert_eq!(
            layer.detail_factor(&Sector::new(-90.0, -80.0, 0.0, 10.0)),
            1.75 * 1.2
        );
        assert_eq!(layer.detail_factor(&Sector::new(70.0, 90.0, 0.0, 10.0)), 1.75);
    }

    #[test]
    fn disabled_layers_draw_nothing() {
        let mut layer = layer();
        layer.enabled = false;
        let mut scene = Scene::new(1e6);

        let (draws, statistics) = scene.render(&mut layer);
        assert_eq!(draws, 0);
        assert_eq!(statistics, FrameStatistics::default());
        assert!(layer.current_tiles().is_empty());
    }
}
