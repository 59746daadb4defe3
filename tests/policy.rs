//! Load policies: read-once loading, HeaderOnly gating and decode caching.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ahds::prelude::*;
use ahds::scan::{parse_designation, SourceReader};

const HEADER: &str = "# AmiraMesh BINARY-LITTLE-ENDIAN 2.1\n\n\
define Lattice 4\n\n\
Lattice { byte Mask } @1(HxByteRLE,5)\n\
Lattice { short Data } @2\n";

/// Memory source that counts how often it is opened.
struct CountingSource {
    inner: MemorySource,
    opens: Arc<AtomicUsize>,
}

impl ByteSource for CountingSource {
    fn open_at(&self, offset: u64) -> Result<SourceReader> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.inner.open_at(offset)
    }

    fn describe(&self) -> String {
        format!("counting {}", self.inner.describe())
    }
}

fn body() -> Vec<u8> {
    let mut bytes = HEADER.as_bytes().to_vec();
    bytes.extend_from_slice(b"\n@1\n");
    bytes.extend_from_slice(&[0x02, 0x05, 0x82, 0x06, 0x07]);
    bytes.extend_from_slice(b"\n@2\n");
    for v in [10i16, -20, 30, -40] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes.push(b'\n');
    bytes
}

fn counted(policy: LoadPolicy, known_header: bool) -> (DataFile, Arc<AtomicUsize>) {
    let opens = Arc::new(AtomicUsize::new(0));
    let source = CountingSource { inner: MemorySource::new(body()), opens: Arc::clone(&opens) };
    let mut builder = DataFile::builder(source)
        .load_policy(policy)
        .chunk_size(4)
        .declarations(vec![ArrayDeclaration::new("Lattice", vec![4])])
        .definitions(vec![
            DataDefinition::new("Lattice", "Mask", "byte", 1, 1).compressed("HxByteRLE", Some(5)),
            DataDefinition::new("Lattice", "Data", "short", 1, 2),
        ]);
    if known_header {
        let designation = parse_designation("# AmiraMesh BINARY-LITTLE-ENDIAN 2.1").unwrap();
        builder = builder.header(designation, HEADER.len() as u64);
    }
    (builder.build().unwrap(), opens)
}

#[test]
fn test_on_demand_reads_once() {
    let (file, opens) = counted(LoadPolicy::OnDemand, false);
    let after_header = opens.load(Ordering::SeqCst);
    assert_eq!(after_header, 1);

    let mask = file.stream(1).unwrap();
    let first = file.load(&mask).unwrap().to_vec();
    let second = file.load(&mask).unwrap().to_vec();
    assert_eq!(first, second);
    assert_eq!(opens.load(Ordering::SeqCst) - after_header, 1);

    let data = file.stream(2).unwrap();
    assert!(!data.is_loaded());
    file.decode(&data).unwrap();
    file.decode(&data).unwrap();
    assert_eq!(opens.load(Ordering::SeqCst) - after_header, 2);
}

#[test]
fn test_side_loaded_stream_needs_no_read() {
    let (file, opens) = counted(LoadPolicy::OnDemand, true);
    let data = file.stream(2).unwrap();
    file.load(&data).unwrap();
    assert_eq!(opens.load(Ordering::SeqCst), 1);

    let mask = file.stream(1).unwrap();
    assert!(mask.is_loaded());
    assert_eq!(file.decode(&mask).unwrap().len(), 4);
    assert_eq!(opens.load(Ordering::SeqCst), 1);
}

#[test]
fn test_header_only_never_touches_source() {
    let (file, opens) = counted(LoadPolicy::HeaderOnly, true);
    assert_eq!(file.policy(), LoadPolicy::HeaderOnly);
    let shown = format!("{:?}", file);
    assert!(shown.contains("header_len"), "{}", shown);
    assert!(shown.contains("HeaderOnly"), "{}", shown);

    let mask = file.stream(1).unwrap();
    assert!(matches!(file.load(&mask).unwrap_err(), Error::PolicyViolation(_)));
    assert!(matches!(file.decode(&mask).unwrap_err(), Error::PolicyViolation(_)));
    assert!(matches!(file.decode_all().unwrap_err(), Error::PolicyViolation(_)));
    assert!(!mask.is_loaded());
    assert_eq!(opens.load(Ordering::SeqCst), 0);
}

#[test]
fn test_load_all_bypasses_policy() {
    let (file, opens) = counted(LoadPolicy::HeaderOnly, true);
    file.load_all().unwrap();
    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert!(file.streams().iter().all(|s| s.is_loaded()));

    let data = file.stream(2).unwrap();
    assert!(matches!(file.decode(&data).unwrap_err(), Error::PolicyViolation(_)));
}

#[test]
fn test_immediate_loads_at_open() {
    let (file, opens) = counted(LoadPolicy::Immediate, false);
    assert_eq!(opens.load(Ordering::SeqCst), 2);
    assert!(file.streams().iter().all(|s| s.is_loaded()));

    let data = file.stream(2).unwrap();
    assert_eq!(file.decode(&data).unwrap().as_i16(), Some(&[10i16, -20, 30, -40][..]));
    assert_eq!(opens.load(Ordering::SeqCst), 2);
}

#[test]
fn test_decode_is_cached() {
    let (file, _) = counted(LoadPolicy::OnDemand, true);
    let mask = file.stream(1).unwrap();
    let first = file.decode(&mask).unwrap();
    let second = file.decode(&mask).unwrap();
    assert!(std::ptr::eq(first, second));
    assert_eq!(first.as_u8(), Some(&[5u8, 5, 6, 7][..]));

    file.decode_all().unwrap();
    assert!(std::ptr::eq(file.decode(&mask).unwrap(), first));
}

#[test]
fn test_policy_from_config() {
    let config: ReaderConfig = serde_json::from_str(r#"{"policy": "headeronly", "chunk_size": 16}"#).unwrap();
    let file = DataFile::builder(MemorySource::new(body()))
        .config(config)
        .declarations(vec![ArrayDeclaration::new("Lattice", vec![4])])
        .definitions(vec![DataDefinition::new("Lattice", "Mask", "byte", 1, 1).compressed("HxByteRLE", Some(5))])
        .build()
        .unwrap();
    assert_eq!(file.policy(), LoadPolicy::HeaderOnly);

    let bad = DataFile::builder(MemorySource::new(body())).chunk_size(0).build();
    assert!(matches!(bad.unwrap_err(), Error::Config(_)));
}
