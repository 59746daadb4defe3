//! HyperSurface bodies: label discovery, group nesting and inline values.

use std::io::Write;

use ahds::prelude::*;
use ahds::scan::InlineValue;

const ASCII_SURFACE: &str = "# HyperSurface 0.1 ASCII\n\n\
Parameters {\n\
    Materials {\n\
        Exterior { Id 1 }\n\
        Inside { Id 2 }\n\
    }\n\
}\n\n\
Vertices 4\n\
0 0 0\n\
1 0 0\n\
0 1 0\n\
0 0 1\n\
NBranchingPoints 0\n\
NVerticesOnCurves 0\n\
BoundaryCurves 0\n\
Patches 2\n\
{\n\
InnerRegion Inside\n\
OuterRegion Exterior\n\
Triangles 2\n\
1 2 3\n\
1 3 4\n\
}\n\
{\n\
InnerRegion Inside\n\
OuterRegion Exterior\n\
Triangles 1\n\
2 3 4\n\
}\n";

fn open(text: &[u8], chunk: usize) -> DataFile {
    DataFile::builder(MemorySource::new(text.to_vec())).chunk_size(chunk).build().unwrap()
}

fn patches(count: usize, blocks: usize) -> String {
    let mut text = String::from("# HyperSurface 0.1 ASCII\n\nVertices 1\n0 0 0\n");
    text.push_str(&format!("Patches {}\n", count));
    for _ in 0..blocks {
        text.push_str("{\nInnerRegion A\nOuterRegion B\nTriangles 1\n1 1 1\n}\n");
    }
    text
}

fn be_f32(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

fn be_i32(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

#[test]
fn test_ascii_streams_discovered_in_order() {
    for chunk in [3, 8, 17, 4096] {
        let file = open(ASCII_SURFACE.as_bytes(), chunk);
        assert_eq!(file.designation().format, FileFormat::HyperSurface);
        assert!(file.header_text().contains("Materials"));
        assert!(file.streams().is_empty());

        let vertices = file.stream(1).unwrap();
        assert_eq!(vertices.array_name(), "Vertices");
        assert_eq!(vertices.name(), "Coordinates");
        let coords = file.decode(&vertices).unwrap();
        assert_eq!(coords.shape().dims(), &[4, 3]);
        assert_eq!(coords.as_f32().unwrap()[3], 1.0);

        let tri2 = file.stream(3).unwrap();
        assert_eq!(tri2.array_name(), "Patch2");
        assert_eq!(file.decode(&tri2).unwrap().as_i32(), Some(&[2, 3, 4][..]));

        // passed on the way to @3
        let tri1 = file.stream(2).unwrap();
        assert!(tri1.is_loaded());
        assert_eq!(file.decode(&tri1).unwrap().as_i32(), Some(&[1, 2, 3, 1, 3, 4][..]));
    }
}

#[test]
fn test_lookup_by_name_and_arrays() {
    let file = open(ASCII_SURFACE.as_bytes(), 16);
    let tri = file.stream_by_name("Patch2", "Triangles").unwrap();
    assert_eq!(tri.index(), 3);
    assert_eq!(tri.elem_count(), 3);

    let arrays = file.arrays();
    assert_eq!(arrays.root_attributes().get("NBranchingPoints"), Some(&InlineValue::Count(0)));

    let group = arrays.find("Patches").unwrap();
    let node = arrays.get(group).unwrap();
    assert!(node.collection);
    assert_eq!(node.children().len(), 2);

    let patch1 = arrays.get(arrays.find("Patch1").unwrap()).unwrap();
    assert_eq!(patch1.parent, Some(group));
    assert_eq!(patch1.item_id, Some(1));
    assert_eq!(patch1.attributes.get("InnerRegion"), Some(&InlineValue::Text("Inside".into())));
    assert_eq!(patch1.attributes.get("OuterRegion"), Some(&InlineValue::Text("Exterior".into())));

    assert!(file.stream_by_name("Patch7", "Triangles").is_err());
    assert!(matches!(file.stream(4).unwrap_err(), Error::StreamNotFound { index: 4 }));
}

#[test]
fn test_group_count_mismatch() {
    let too_few = DataFile::builder(MemorySource::new(patches(3, 2).into_bytes())).build().unwrap();
    assert!(matches!(too_few.load_all().unwrap_err(), Error::StructuralCorruption(_)));

    let too_many = DataFile::builder(MemorySource::new(patches(3, 4).into_bytes())).build().unwrap();
    assert!(matches!(too_many.load_all().unwrap_err(), Error::StructuralCorruption(_)));

    let exact = DataFile::builder(MemorySource::new(patches(3, 3).into_bytes())).build().unwrap();
    exact.load_all().unwrap();
    assert_eq!(exact.streams().len(), 4);
}

#[test]
fn test_missing_required_field() {
    let text = "# HyperSurface 0.1 ASCII\n\nVertices 1\n0 0 0\nPatches 1\n{\nInnerRegion A\nTriangles 1\n1 1 1\n}\n";
    let file = DataFile::builder(MemorySource::new(text.as_bytes().to_vec())).build().unwrap();
    let err = file.load_all().unwrap_err();
    assert!(err.to_string().contains("OuterRegion"), "{}", err);
}

#[test]
fn test_binary_surface() {
    let mut bytes = b"# HyperSurface 0.1 BINARY\n\nParameters {\n}\n\nVertices 3\n".to_vec();
    bytes.extend(be_f32(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]));
    bytes.extend_from_slice(b"\nPatches 1\n{\nInnerRegion Inside\nOuterRegion Exterior\nTriangles 1\n");
    bytes.extend(be_i32(&[1, 2, 3]));
    bytes.extend_from_slice(b"\n}\n");

    for chunk in [1, 7, 64] {
        let file = open(&bytes, chunk);
        assert_eq!(file.designation().encoding, Encoding::BinaryBig);

        let tri = file.stream_by_name("Patch1", "Triangles").unwrap();
        assert_eq!(file.decode(&tri).unwrap().as_i32(), Some(&[1, 2, 3][..]));
        let coords = file.stream(1).unwrap();
        assert_eq!(
            file.decode(&coords).unwrap().as_f32(),
            Some(&[0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0][..])
        );
        file.load_all().unwrap();
    }
}

#[test]
fn test_binary_payload_truncated() {
    let mut bytes = b"# HyperSurface 0.1 BINARY\n\nVertices 3\n".to_vec();
    bytes.extend(be_f32(&[0.0, 1.0, 2.0, 3.0]));
    let file = open(&bytes, 8);
    assert!(matches!(
        file.stream(1).unwrap_err(),
        Error::TruncatedStream { index: 1, expected: 36, actual: 16 }
    ));
}

#[test]
fn test_open_from_disk_with_mmap() {
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(ASCII_SURFACE.as_bytes()).unwrap();
    tmp.flush().unwrap();

    let config = ReaderConfig { policy: LoadPolicy::Immediate, use_mmap: true, ..Default::default() };
    let file = DataFile::open(tmp.path(), &config).unwrap();
    assert_eq!(file.streams().len(), 3);
    assert!(file.streams().iter().all(|s| s.is_loaded()));

    let plain = DataFile::open(tmp.path(), &ReaderConfig::default()).unwrap();
    let tri = plain.stream(2).unwrap();
    assert_eq!(plain.decode(&tri).unwrap().len(), 6);
}
