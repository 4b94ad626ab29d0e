use std::fs;
use std::path::Path;
use tempfile::TempDir;

use mapedit::config::{TerrainEntry, TilesetEntry, TilesetRegistry};
use mapedit::formats::mcd::{self, PartRecord};
use mapedit::formats::pck::{
    Sprite, Spriteset, TabwordLength, SPRITE_HEIGHT, SPRITE_PIXELS, SPRITE_WIDTH,
};
use mapedit::formats::rmp::{self, NodeRecord, LINK_NOT_USED, NODE_LINKS};
use mapedit::model::{
    CatalogError, CatalogWarning, Descriptor, GridLocation, MapModel, PartSlot, Terrain,
    TilesetData,
};

fn write_terrain(base: &Path, label: &str, records: &[PartRecord]) {
    let dir = base.join("TERRAIN");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{label}.MCD")), mcd::write_records(records)).unwrap();

    let sprites: Vec<Sprite> = (0..records.len().max(1))
        .map(|i| {
            let mut pixels = vec![0u8; SPRITE_PIXELS];
            pixels[i % SPRITE_PIXELS] = 1 + (i % 200) as u8;
            Sprite::new(pixels)
        })
        .collect();
    Spriteset::from_sprites(label, TabwordLength::Four, SPRITE_WIDTH, SPRITE_HEIGHT, sprites)
        .write(&dir)
        .unwrap();
}

fn descriptor(base: &Path, labels: &[&str]) -> Descriptor {
    Descriptor {
        label: "TEST".into(),
        basepath: base.to_owned(),
        terrains: labels
            .iter()
            .map(|&label| Terrain {
                label: label.into(),
                path: "TERRAIN".into(),
            })
            .collect(),
    }
}

#[test]
fn builds_a_catalog_across_terrains() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path();

    let mut records = vec![PartRecord::default(); 3];
    records[0].die_tile = 2; // second part of the same terrain
    write_terrain(base, "ROADS", &records);
    write_terrain(base, "WALLS", &vec![PartRecord::default(); 2]);

    let tileset = TilesetData::build(descriptor(base, &["ROADS", "WALLS"])).unwrap();
    assert_eq!(tileset.len(), 5);
    assert!(tileset.warnings().is_empty());

    let part = tileset.part(0).unwrap();
    assert_eq!(part.dead_ref, Some(1));
    assert_eq!(tileset.part(3).unwrap().terrain, 1);
    assert_eq!(tileset.part(3).unwrap().ter_id, 0);

    // sprite phases resolve through the terrain's own set
    assert!(tileset.sprite(part, 0).is_some());
}

#[test]
fn oversized_catalog_warns_but_still_builds() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path();

    let labels = ["T0", "T1", "T2", "T3", "T4"];
    for label in labels {
        write_terrain(base, label, &vec![PartRecord::default(); 50]);
    }

    let tileset = TilesetData::build(descriptor(base, &labels)).unwrap();
    assert_eq!(tileset.len(), 250);
    assert!(tileset.warnings().is_empty());

    // one terrain too many pushes the catalog past the index byte
    write_terrain(base, "T5", &vec![PartRecord::default(); 10]);
    let labels = ["T0", "T1", "T2", "T3", "T4", "T5"];
    let tileset = TilesetData::build(descriptor(base, &labels)).unwrap();

    assert_eq!(tileset.len(), 260);
    assert_eq!(
        tileset.warnings(),
        &[CatalogWarning::RecordCountExceeded { total: 260 }]
    );
    assert!(tileset.part(259).is_some());
}

#[test]
fn missing_and_corrupt_terrain_files_are_reported() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path();
    let dir = base.join("TERRAIN");
    fs::create_dir_all(&dir).unwrap();

    // records without a sprite pair
    fs::write(
        dir.join("LONELY.MCD"),
        mcd::write_records(&[PartRecord::default()]),
    )
    .unwrap();
    assert!(matches!(
        TilesetData::build(descriptor(base, &["LONELY"])),
        Err(CatalogError::FileNotFound { .. })
    ));

    // record file with a ragged length
    write_terrain(base, "RAGGED", &vec![PartRecord::default(); 2]);
    let mcd_path = dir.join("RAGGED.MCD");
    let mut bytes = fs::read(&mcd_path).unwrap();
    bytes.push(0);
    fs::write(&mcd_path, &bytes).unwrap();

    assert!(matches!(
        TilesetData::build(descriptor(base, &["RAGGED"])),
        Err(CatalogError::CorruptFile { .. })
    ));
}

fn map_bytes(rows: u8, cols: u8, levs: u8, quads: &[[u8; 4]]) -> Vec<u8> {
    let mut bytes = vec![rows, cols, levs];
    for quad in quads {
        bytes.extend_from_slice(quad);
    }
    bytes
}

#[test]
fn opens_edits_and_saves_a_map() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path();
    write_terrain(base, "ROADS", &vec![PartRecord::default(); 5]);
    let tileset = TilesetData::build(descriptor(base, &["ROADS"])).unwrap();

    // 2x2x1, one valid floor, one reference beyond the 5-part catalog
    let quads = [[2, 0, 0, 0], [200, 0, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0]];
    let map_path = base.join("SAMPLE.MAP");
    let route_path = base.join("SAMPLE.RMP");
    fs::write(&map_path, map_bytes(2, 2, 1, &quads)).unwrap();

    let tileset2 = TilesetData::build(descriptor(base, &["ROADS"])).unwrap();
    let mut model = MapModel::open(tileset, &map_path, &route_path).unwrap();

    // the stray byte was clamped to blank and flagged for saving
    assert_eq!(model.grid.cell(GridLocation::new(0, 0, 0)).floor, Some(0));
    assert_eq!(model.grid.cell(GridLocation::new(0, 1, 0)).floor, None);
    assert!(model.grid.is_changed());

    model.set_part(GridLocation::new(1, 0, 0), PartSlot::Content, Some(4));
    let node = model.add_node(GridLocation::new(1, 1, 0)).unwrap();
    assert_eq!(model.grid.cell(GridLocation::new(1, 1, 0)).node, Some(node));

    model.save().unwrap();
    assert!(!model.is_changed());
    assert!(route_path.exists());

    // a fresh open sees the repaired, edited map
    let model = MapModel::open(tileset2, &map_path, &route_path).unwrap();
    assert!(!model.grid.is_changed());
    assert_eq!(model.grid.cell(GridLocation::new(1, 0, 0)).content, Some(4));
    assert_eq!(model.routes.len(), 1);
    assert_eq!(model.grid.cell(GridLocation::new(1, 1, 0)).node, Some(0));
}

#[test]
fn shrinking_resize_reports_dangling_nodes() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path();
    write_terrain(base, "ROADS", &[PartRecord::default()]);
    let tileset = TilesetData::build(descriptor(base, &["ROADS"])).unwrap();

    let map_path = base.join("WIDE.MAP");
    let route_path = base.join("WIDE.RMP");
    fs::write(&map_path, map_bytes(4, 4, 2, &[[0; 4]; 32])).unwrap();

    // two nodes, the second out past the upcoming shrink
    let mut far = NodeRecord {
        row: 3,
        col: 3,
        lev: 1,
        unknown3: 0,
        links: [[LINK_NOT_USED, 0, 0]; NODE_LINKS],
        unit: 0,
        rank: 0,
        patrol: 0,
        attack: 0,
        spawn: 0,
    };
    let near = NodeRecord { row: 0, col: 0, lev: 0, ..far };
    far.links[0] = [0, 1, 0]; // far points at near
    fs::write(&route_path, rmp::write_records(&[near, far])).unwrap();

    let mut model = MapModel::open(tileset, &map_path, &route_path).unwrap();
    let dangling = model.resize(2, 2, 1, false).unwrap();
    assert_eq!(dangling, vec![1]);

    model.remove_nodes(&dangling);
    assert_eq!(model.routes.len(), 1);
    assert_eq!(model.grid.cell(GridLocation::new(0, 0, 0)).node, Some(0));

    model.save().unwrap();
    let reloaded = MapModel::open(
        TilesetData::build(descriptor(base, &["ROADS"])).unwrap(),
        &map_path,
        &route_path,
    )
    .unwrap();
    assert_eq!(reloaded.grid.rows(), 2);
    assert_eq!(reloaded.routes.len(), 1);
    assert!(reloaded.routes.check_bounds(&reloaded.grid).is_empty());
}

#[test]
fn growing_the_ceiling_carries_routes_down() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path();
    write_terrain(base, "ROADS", &[PartRecord::default()]);
    let tileset = TilesetData::build(descriptor(base, &["ROADS"])).unwrap();

    let map_path = base.join("LOW.MAP");
    let route_path = base.join("LOW.RMP");
    let quads = [[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]];
    fs::write(&map_path, map_bytes(2, 2, 1, &quads)).unwrap();

    let mut model = MapModel::open(tileset, &map_path, &route_path).unwrap();
    model.add_node(GridLocation::new(0, 0, 0)).unwrap();

    let dangling = model.resize(2, 2, 3, true).unwrap();
    assert!(dangling.is_empty());

    // content and its node both moved two levels down in index space
    assert_eq!(model.grid.cell(GridLocation::new(0, 0, 2)).floor, Some(0));
    assert!(model.grid.cell(GridLocation::new(0, 0, 0)).is_blank());
    assert_eq!(model.routes.node(0).unwrap().lev, 2);
    assert_eq!(model.grid.cell(GridLocation::new(0, 0, 2)).node, Some(0));
}

#[test]
fn registry_drives_a_full_open() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path();
    write_terrain(base, "ROADS", &vec![PartRecord::default(); 2]);

    let registry = TilesetRegistry {
        tilesets: vec![TilesetEntry {
            label: "TEST".into(),
            basepath: base.to_owned(),
            terrains: vec![TerrainEntry {
                label: "ROADS".into(),
                path: "TERRAIN".into(),
            }],
        }],
    };
    let registry_path = base.join("tilesets.json");
    registry.save(&registry_path).unwrap();

    let loaded = TilesetRegistry::load(&registry_path).unwrap();
    let tileset = TilesetData::build(loaded.find("TEST").unwrap().to_descriptor()).unwrap();
    assert_eq!(tileset.len(), 2);
}

#[test]
fn terrain_records_save_back_with_synced_refs() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path();

    let mut records = vec![PartRecord::default(); 3];
    records[2].alt_tile = 1; // first part of the terrain
    write_terrain(base, "ROADS", &records);

    let mut tileset = TilesetData::build(descriptor(base, &["ROADS"])).unwrap();
    assert_eq!(tileset.part(2).unwrap().alt_ref, Some(0));

    tileset.save_terrain(0).unwrap();

    let bytes = fs::read(base.join("TERRAIN").join("ROADS.MCD")).unwrap();
    let back = mcd::read_records(&bytes, "ROADS").unwrap();
    assert_eq!(back.len(), 3);
    assert_eq!(back[2].alt_tile, 1);
}
