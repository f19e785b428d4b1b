//! End-to-end tests against a live listener and an on-disk pyramid.
//!
//! The fixture publishes one gray 8-bit layer `dem` on a 4x4 matrix of
//! 256px tiles at 1 m/px (world 0..1024 in EPSG:3857). Only tile (0,3) —
//! the bottom-left corner, world (0,0)-(256,256) — exists; its pixel value
//! is the column index.

use assert_fs::TempDir;
use terratiles::{Config, TileServer};

const NODATA: u8 = 255;

fn descriptor(root: &str) -> String {
	format!(
		r"
server:
  ip: 127.0.0.1
  port: 0
services:
  reconnect_interval_seconds: 0
tile_matrix_sets:
  - id: webmerc
    crs: EPSG:3857
    matrices:
      - {{ id: '12', resolution: 1.0, x0: 0.0, y0: 1024.0, tile_width: 256, tile_height: 256, matrix_width: 4, matrix_height: 4 }}
styles:
  - id: heat
    transforms:
      - type: palette
        stops:
          - {{ value: 0, color: [0, 0, 0, 64] }}
          - {{ value: 255, color: [255, 255, 255, 64] }}
pyramids:
  - id: dem
    tile_matrix_set: webmerc
    channels: 1
    sample_format: u8
    photometric: gray
    nodata: [255]
    codec: png
    storage: {{ type: file, root: {root} }}
    levels:
      - {{ id: '12', min_col: 0, max_col: 3, min_row: 0, max_row: 3 }}
layers:
  - id: dem
    title: Elevation
    pyramid: dem
    styles: [normal, heat]
    wms_crs: [EPSG:3857, CRS:84]
    resampling: nearest
"
	)
}

/// Writes the fixture tile (0,3): value = column index.
fn write_fixture_tile(dir: &TempDir) -> Vec<u8> {
	let img = image::GrayImage::from_fn(256, 256, |x, _y| image::Luma([x as u8]));
	let path = dir.path().join("12/0_3.png");
	std::fs::create_dir_all(path.parent().unwrap()).unwrap();
	img.save(&path).unwrap();
	std::fs::read(&path).unwrap()
}

struct Fixture {
	_dir: TempDir,
	server: TileServer,
	stored_tile_bytes: Vec<u8>,
}

impl Fixture {
	async fn start() -> Fixture {
		let dir = TempDir::new().unwrap();
		let stored_tile_bytes = write_fixture_tile(&dir);
		let config = Config::from_string(&descriptor(&dir.path().display().to_string())).unwrap();
		let mut server = TileServer::from_config(config).await.unwrap();
		server.start().await.unwrap();
		Fixture {
			_dir: dir,
			server,
			stored_tile_bytes,
		}
	}

	fn url(&self, path_and_query: &str) -> String {
		format!("http://127.0.0.1:{}{path_and_query}", self.server.get_port())
	}

	async fn get(&self, path_and_query: &str) -> reqwest::Response {
		reqwest::get(self.url(path_and_query)).await.expect("request should reach the server")
	}

	async fn stop(mut self) {
		self.server.stop().await;
	}
}

fn decode_gray(bytes: &[u8]) -> image::GrayImage {
	image::load_from_memory(bytes).unwrap().into_luma8()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn s1_getmap_serves_the_stored_tile() {
	let fixture = Fixture::start().await;

	let response = fixture
		.get("/wms?SERVICE=WMS&REQUEST=GetMap&VERSION=1.3.0&LAYERS=dem&STYLES=&CRS=EPSG:3857&BBOX=0,0,256,256&WIDTH=256&HEIGHT=256&FORMAT=image/png")
		.await;
	assert_eq!(response.status(), 200);
	assert_eq!(response.headers()["content-type"], "image/png");

	let body = response.bytes().await.unwrap();
	let got = decode_gray(&body);
	let stored = decode_gray(&fixture.stored_tile_bytes);
	assert_eq!(got.dimensions(), (256, 256));
	for y in [0u32, 100, 255] {
		for x in [0u32, 64, 128, 255] {
			assert_eq!(got.get_pixel(x, y), stored.get_pixel(x, y), "pixel ({x},{y})");
		}
	}

	fixture.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn s2_reprojected_request_matches_within_a_pixel() {
	let fixture = Fixture::start().await;

	// The same 256 m square, expressed in lon/lat.
	let registry = terratiles_core::CrsRegistry::with_defaults();
	let mercator = registry.get("EPSG:3857").unwrap();
	let lonlat = registry.get("CRS:84").unwrap();
	let native = terratiles_core::BBox::new(0.0, 0.0, 256.0, 256.0, "EPSG:3857").unwrap();
	let geo = terratiles_raster::reproject_bbox(&native, &mercator, &lonlat).unwrap();

	let response = fixture
		.get(&format!(
			"/wms?SERVICE=WMS&REQUEST=GetMap&VERSION=1.3.0&LAYERS=dem&STYLES=&CRS=CRS:84&BBOX={},{},{},{}&WIDTH=256&HEIGHT=256&FORMAT=image/png",
			geo.xmin, geo.ymin, geo.xmax, geo.ymax
		))
		.await;
	assert_eq!(response.status(), 200);
	let body = response.bytes().await.unwrap();
	let got = decode_gray(&body);

	// The gradient has slope 1 per pixel, so one pixel of drift means one
	// unit of value difference.
	for y in [32u32, 128, 224] {
		for x in [8u32, 64, 128, 200, 247] {
			let value = got.get_pixel(x, y).0[0] as i32;
			assert!(
				(value - x as i32).abs() <= 1,
				"pixel ({x},{y}) drifted more than one pixel: value {value}"
			);
		}
	}

	fixture.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn s3_extended_mosaic_pads_with_nodata() {
	let fixture = Fixture::start().await;

	let response = fixture
		.get("/wms?SERVICE=WMS&REQUEST=GetMap&VERSION=1.3.0&LAYERS=dem&STYLES=&CRS=EPSG:3857&BBOX=-100,-100,356,356&WIDTH=456&HEIGHT=456&FORMAT=image/png")
		.await;
	assert_eq!(response.status(), 200);
	let got = decode_gray(&response.bytes().await.unwrap());
	assert_eq!(got.dimensions(), (456, 456));

	// Outer ring: nodata on every side.
	for (x, y) in [(0u32, 0u32), (99, 200), (200, 99), (455, 455), (200, 390), (390, 200)] {
		assert_eq!(got.get_pixel(x, y).0[0], NODATA, "ring pixel ({x},{y})");
	}

	// Inner 256x256 block matches the stored tile exactly.
	let stored = decode_gray(&fixture.stored_tile_bytes);
	for y in [0u32, 64, 255] {
		for x in [0u32, 13, 128, 255] {
			assert_eq!(
				got.get_pixel(100 + x, 100 + y),
				stored.get_pixel(x, y),
				"inner pixel ({x},{y})"
			);
		}
	}

	fixture.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn s4_palette_style_maps_values_to_colours() {
	let fixture = Fixture::start().await;

	let response = fixture
		.get("/wms?SERVICE=WMS&REQUEST=GetMap&VERSION=1.3.0&LAYERS=dem&STYLES=heat&CRS=EPSG:3857&BBOX=0,0,256,256&WIDTH=256&HEIGHT=256&FORMAT=image/png")
		.await;
	assert_eq!(response.status(), 200);

	let rgba = image::load_from_memory(&response.bytes().await.unwrap())
		.unwrap()
		.into_rgba8();
	// Column 128 carries value 128: a continuous two-stop ramp maps it to
	// mid-gray with the stops' alpha.
	assert_eq!(rgba.get_pixel(128, 64).0, [128, 128, 128, 64]);
	assert_eq!(rgba.get_pixel(0, 64).0, [0, 0, 0, 64]);

	fixture.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn s5_wmts_tile_outside_the_matrix_is_an_invalid_parameter() {
	let fixture = Fixture::start().await;

	let response = fixture
		.get("/wmts?SERVICE=WMTS&REQUEST=GetTile&LAYER=dem&TILEMATRIXSET=webmerc&TILEMATRIX=12&TILECOL=5&TILEROW=0&FORMAT=image/png&STYLE=")
		.await;
	assert_eq!(response.status(), 400);
	let body = response.text().await.unwrap();
	assert!(body.contains("InvalidParameterValue"), "{body}");

	fixture.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn s6_markup_in_layer_names_is_not_echoed() {
	let fixture = Fixture::start().await;

	let response = fixture
		.get("/wms?SERVICE=WMS&REQUEST=GetMap&VERSION=1.3.0&LAYERS=dem%3Cscript%3E&STYLES=&CRS=EPSG:3857&BBOX=0,0,256,256&WIDTH=256&HEIGHT=256&FORMAT=image/png")
		.await;
	assert_eq!(response.status(), 400);
	let body = response.text().await.unwrap();
	assert!(body.contains("LayerNotDefined"), "{body}");
	assert!(!body.contains("<script>"), "injected markup must not be echoed: {body}");

	fixture.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn wmts_passthrough_returns_the_stored_bytes() {
	let fixture = Fixture::start().await;

	let response = fixture
		.get("/wmts?SERVICE=WMTS&REQUEST=GetTile&LAYER=dem&TILEMATRIXSET=webmerc&TILEMATRIX=12&TILECOL=0&TILEROW=3&FORMAT=image/png&STYLE=")
		.await;
	assert_eq!(response.status(), 200);
	let body = response.bytes().await.unwrap();
	assert_eq!(
		body.as_ref(),
		fixture.stored_tile_bytes.as_slice(),
		"passthrough must return the stored object byte for byte"
	);

	fixture.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tms_depths_answer_documents_then_tiles() {
	let fixture = Fixture::start().await;

	let root = fixture.get("/tms/1.0.0").await;
	assert_eq!(root.status(), 200);
	let text = root.text().await.unwrap();
	assert!(text.contains("<TileMapService") && text.contains("dem"), "{text}");

	let layer = fixture.get("/tms/1.0.0/dem").await;
	assert_eq!(layer.status(), 200);
	let text = layer.text().await.unwrap();
	assert!(text.contains("<TileMap") && text.contains("EPSG:3857"), "{text}");

	let matrix = fixture.get("/tms/1.0.0/dem/12").await;
	assert_eq!(matrix.status(), 200);
	let text = matrix.text().await.unwrap();
	assert!(text.contains("<MatrixWidth>4</MatrixWidth>"), "{text}");

	// TMS rows count from the bottom: y=0 is stored row 3.
	let tile = fixture.get("/tms/1.0.0/dem/12/0/0.png").await;
	assert_eq!(tile.status(), 200);
	let body = tile.bytes().await.unwrap();
	assert_eq!(body.as_ref(), fixture.stored_tile_bytes.as_slice());

	fixture.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tms_extension_must_match_the_stored_format() {
	let fixture = Fixture::start().await;
	let response = fixture.get("/tms/1.0.0/dem/12/0/0.jpg").await;
	assert_eq!(response.status(), 400);
	assert!(response.text().await.unwrap().contains("InvalidFormat"));
	fixture.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn error_surface() {
	let fixture = Fixture::start().await;

	// Missing SERVICE.
	let response = fixture.get("/ogc?REQUEST=GetMap").await;
	assert_eq!(response.status(), 400);
	assert!(response.text().await.unwrap().contains("MissingParameterValue"));

	// Unknown layer.
	let response = fixture
		.get("/wms?SERVICE=WMS&REQUEST=GetMap&LAYERS=nope&STYLES=&CRS=EPSG:3857&BBOX=0,0,1,1&WIDTH=16&HEIGHT=16&FORMAT=image/png")
		.await;
	assert_eq!(response.status(), 400);
	assert!(response.text().await.unwrap().contains("LayerNotDefined"));

	// Unknown style.
	let response = fixture
		.get("/wms?SERVICE=WMS&REQUEST=GetMap&LAYERS=dem&STYLES=rainbow&CRS=EPSG:3857&BBOX=0,0,1,1&WIDTH=16&HEIGHT=16&FORMAT=image/png")
		.await;
	assert_eq!(response.status(), 400);
	assert!(response.text().await.unwrap().contains("StyleNotDefined"));

	// CRS not on the layer list.
	let response = fixture
		.get("/wms?SERVICE=WMS&REQUEST=GetMap&LAYERS=dem&STYLES=&CRS=EPSG:2154&BBOX=0,0,1,1&WIDTH=16&HEIGHT=16&FORMAT=image/png")
		.await;
	assert_eq!(response.status(), 400);
	assert!(response.text().await.unwrap().contains("InvalidCRS"));

	// Format off the list.
	let response = fixture
		.get("/wms?SERVICE=WMS&REQUEST=GetMap&LAYERS=dem&STYLES=&CRS=EPSG:3857&BBOX=0,0,1,1&WIDTH=16&HEIGHT=16&FORMAT=application/pdf")
		.await;
	assert_eq!(response.status(), 400);
	assert!(response.text().await.unwrap().contains("InvalidFormat"));

	// Oversized image.
	let response = fixture
		.get("/wms?SERVICE=WMS&REQUEST=GetMap&LAYERS=dem&STYLES=&CRS=EPSG:3857&BBOX=0,0,1,1&WIDTH=100000&HEIGHT=16&FORMAT=image/png")
		.await;
	assert_eq!(response.status(), 400);

	fixture.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn capabilities_documents() {
	let fixture = Fixture::start().await;

	let response = fixture.get("/wms?SERVICE=WMS&REQUEST=GetCapabilities").await;
	assert_eq!(response.status(), 200);
	let text = response.text().await.unwrap();
	assert!(text.contains("WMS_Capabilities") && text.contains("version=\"1.3.0\""), "{text}");
	assert!(text.contains("<Name>dem</Name>"));

	let response = fixture.get("/wmts?SERVICE=WMTS&REQUEST=GetCapabilities").await;
	assert_eq!(response.status(), 200);
	let text = response.text().await.unwrap();
	assert!(text.contains("<Identifier>dem</Identifier>"), "{text}");
	assert!(text.contains("<Identifier>webmerc</Identifier>"), "{text}");

	fixture.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reload_swaps_the_catalogue_while_serving() {
	let fixture = Fixture::start().await;

	let heat_query = "/wms?SERVICE=WMS&REQUEST=GetMap&VERSION=1.3.0&LAYERS=dem&STYLES=heat&CRS=EPSG:3857&BBOX=0,0,256,256&WIDTH=64&HEIGHT=64&FORMAT=image/png";
	assert_eq!(fixture.get(heat_query).await.status(), 200);

	// Reload with a descriptor that drops the 'heat' style from the layer.
	let stripped = descriptor(&fixture._dir.path().display().to_string()).replace("styles: [normal, heat]", "styles: [normal]");
	let next = Config::from_string(&stripped).unwrap();
	fixture.server.reload(&next).await.unwrap();

	let response = fixture.get(heat_query).await;
	assert_eq!(response.status(), 400);
	assert!(response.text().await.unwrap().contains("StyleNotDefined"));

	// The default style still serves.
	let normal = heat_query.replace("STYLES=heat", "STYLES=");
	assert_eq!(fixture.get(&normal).await.status(), 200);

	fixture.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn status_probe() {
	let fixture = Fixture::start().await;
	let response = fixture.get("/status").await;
	assert_eq!(response.status(), 200);
	assert_eq!(response.text().await.unwrap(), "ready!");
	fixture.stop().await;
}
