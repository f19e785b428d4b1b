//! Minimal Capabilities and TMS directory documents.
//!
//! Full document synthesis belongs to the front-office collaborators; these
//! are the thin summaries the HTTP surface still has to answer with.

use crate::catalog::{Catalog, Layer};
use std::fmt::Write;
use terratiles_pyramid::Level;

fn xml_escape(value: &str) -> String {
	value
		.replace('&', "&amp;")
		.replace('<', "&lt;")
		.replace('>', "&gt;")
		.replace('"', "&quot;")
}

/// WMS GetCapabilities: service block plus one Layer element per WMS layer.
pub fn wms_capabilities(catalog: &Catalog, version: &str) -> String {
	let mut doc = String::new();
	let _ = writeln!(doc, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
	let _ = writeln!(doc, "<WMS_Capabilities version=\"{}\">", xml_escape(version));
	let _ = writeln!(doc, "  <Service><Name>WMS</Name></Service>");
	let _ = writeln!(doc, "  <Capability>");

	let mut layers: Vec<_> = catalog.layers.values().filter(|l| l.wms).collect();
	layers.sort_by(|a, b| a.id.cmp(&b.id));
	for layer in layers {
		let _ = writeln!(doc, "    <Layer queryable=\"{}\">", u8::from(layer.feature_info_url.is_some()));
		let _ = writeln!(doc, "      <Name>{}</Name>", xml_escape(&layer.id));
		let _ = writeln!(doc, "      <Title>{}</Title>", xml_escape(&layer.title));
		for crs in &layer.wms_crs {
			let _ = writeln!(doc, "      <CRS>{}</CRS>", xml_escape(crs));
		}
		let b = &layer.geo_bbox;
		let _ = writeln!(
			doc,
			"      <EX_GeographicBoundingBox><westBoundLongitude>{}</westBoundLongitude><eastBoundLongitude>{}</eastBoundLongitude><southBoundLatitude>{}</southBoundLatitude><northBoundLatitude>{}</northBoundLatitude></EX_GeographicBoundingBox>",
			b.xmin, b.xmax, b.ymin, b.ymax
		);
		for style in &layer.styles {
			let _ = writeln!(
				doc,
				"      <Style><Name>{}</Name><Title>{}</Title></Style>",
				xml_escape(&style.id),
				xml_escape(&style.title)
			);
		}
		let _ = writeln!(doc, "    </Layer>");
	}

	let _ = writeln!(doc, "  </Capability>");
	let _ = writeln!(doc, "</WMS_Capabilities>");
	doc
}

/// WMTS GetCapabilities: layers and the tile matrix sets they publish in.
pub fn wmts_capabilities(catalog: &Catalog) -> String {
	let mut doc = String::new();
	let _ = writeln!(doc, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
	let _ = writeln!(doc, "<Capabilities version=\"1.0.0\">");
	let _ = writeln!(doc, "  <Contents>");

	let mut layers: Vec<_> = catalog.layers.values().filter(|l| l.wmts).collect();
	layers.sort_by(|a, b| a.id.cmp(&b.id));
	for layer in layers {
		let _ = writeln!(doc, "    <Layer>");
		let _ = writeln!(doc, "      <Identifier>{}</Identifier>", xml_escape(&layer.id));
		let _ = writeln!(doc, "      <Title>{}</Title>", xml_escape(&layer.title));
		for style in &layer.styles {
			let _ = writeln!(doc, "      <Style><Identifier>{}</Identifier></Style>", xml_escape(&style.id));
		}
		let _ = writeln!(
			doc,
			"      <TileMatrixSetLink><TileMatrixSet>{}</TileMatrixSet></TileMatrixSetLink>",
			xml_escape(&layer.pyramid.tms.id)
		);
		let _ = writeln!(doc, "    </Layer>");
	}

	let mut sets: Vec<_> = catalog.tms.values().collect();
	sets.sort_by(|a, b| a.id.cmp(&b.id));
	for tms in sets {
		let _ = writeln!(doc, "    <TileMatrixSet>");
		let _ = writeln!(doc, "      <Identifier>{}</Identifier>", xml_escape(&tms.id));
		let _ = writeln!(doc, "      <SupportedCRS>{}</SupportedCRS>", xml_escape(&tms.crs));
		for matrix in tms.iter() {
			let _ = writeln!(
				doc,
				"      <TileMatrix><Identifier>{}</Identifier><MatrixWidth>{}</MatrixWidth><MatrixHeight>{}</MatrixHeight></TileMatrix>",
				xml_escape(&matrix.id),
				matrix.matrix_width,
				matrix.matrix_height
			);
		}
		let _ = writeln!(doc, "    </TileMatrixSet>");
	}

	let _ = writeln!(doc, "  </Contents>");
	let _ = writeln!(doc, "</Capabilities>");
	doc
}

/// TMS service summary (`/1.0.0`).
pub fn tms_root(catalog: &Catalog) -> String {
	let mut doc = String::new();
	let _ = writeln!(doc, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
	let _ = writeln!(doc, "<TileMapService version=\"1.0.0\">");
	let _ = writeln!(doc, "  <TileMaps>");
	let mut layers: Vec<_> = catalog.layers.values().filter(|l| l.tms).collect();
	layers.sort_by(|a, b| a.id.cmp(&b.id));
	for layer in layers {
		let _ = writeln!(
			doc,
			"    <TileMap title=\"{}\" srs=\"{}\" href=\"1.0.0/{}\"/>",
			xml_escape(&layer.title),
			xml_escape(&layer.pyramid.tms.crs),
			xml_escape(&layer.id)
		);
	}
	let _ = writeln!(doc, "  </TileMaps>");
	let _ = writeln!(doc, "</TileMapService>");
	doc
}

/// TMS per-layer metadata (`/1.0.0/<layer>`).
pub fn tms_layer(layer: &Layer) -> String {
	let mut doc = String::new();
	let _ = writeln!(doc, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
	let _ = writeln!(doc, "<TileMap version=\"1.0.0\">");
	let _ = writeln!(doc, "  <Title>{}</Title>", xml_escape(&layer.title));
	let _ = writeln!(doc, "  <SRS>{}</SRS>", xml_escape(&layer.pyramid.tms.crs));
	let b = &layer.native_bbox;
	let _ = writeln!(
		doc,
		"  <BoundingBox minx=\"{}\" miny=\"{}\" maxx=\"{}\" maxy=\"{}\"/>",
		b.xmin, b.ymin, b.xmax, b.ymax
	);
	let _ = writeln!(doc, "  <TileSets>");
	for level in layer.pyramid.levels() {
		let _ = writeln!(
			doc,
			"    <TileSet href=\"{}\" units-per-pixel=\"{}\" order=\"{}\"/>",
			xml_escape(level.id()),
			level.resolution(),
			xml_escape(level.id())
		);
	}
	let _ = writeln!(doc, "  </TileSets>");
	let _ = writeln!(doc, "</TileMap>");
	doc
}

/// TMS tile-matrix metadata (`/1.0.0/<layer>/<z>`).
pub fn tms_matrix(layer: &Layer, level: &Level) -> String {
	let tm = &level.tile_matrix;
	let mut doc = String::new();
	let _ = writeln!(doc, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
	let _ = writeln!(doc, "<TileMatrix layer=\"{}\">", xml_escape(&layer.id));
	let _ = writeln!(doc, "  <Identifier>{}</Identifier>", xml_escape(&tm.id));
	let _ = writeln!(doc, "  <Resolution>{}</Resolution>", tm.resolution);
	let _ = writeln!(doc, "  <TopLeftCorner>{} {}</TopLeftCorner>", tm.x0, tm.y0);
	let _ = writeln!(doc, "  <TileWidth>{}</TileWidth>", tm.tile_width);
	let _ = writeln!(doc, "  <TileHeight>{}</TileHeight>", tm.tile_height);
	let _ = writeln!(doc, "  <MatrixWidth>{}</MatrixWidth>", tm.matrix_width);
	let _ = writeln!(doc, "  <MatrixHeight>{}</MatrixHeight>", tm.matrix_height);
	let _ = writeln!(doc, "</TileMatrix>");
	doc
}
