// Round-trip checks against a real libunice68; set UNICE68_TEST_LIB to its path to enable.
use std::path::PathBuf;

use icepack::api::{ErrorKind, ICE_HEADER_LEN, Icepack, NativeLibrary};

fn native_codec() -> Option<Icepack> {
    let path = PathBuf::from(std::env::var_os("UNICE68_TEST_LIB")?);
    let native = NativeLibrary::open_path(&path).expect("bind unice68");
    Some(Icepack::new(native))
}

fn noise(len: usize, mut state: u64) -> Vec<u8> {
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 56) as u8
        })
        .collect()
}

#[test]
fn pack_depack_round_trip() {
    let Some(ice) = native_codec() else {
        eprintln!("UNICE68_TEST_LIB not set; skipping");
        return;
    };

    let data_set = vec![
        noise(1, 1),
        noise(16, 2),
        noise(1024, 3),
        noise(48_731, 4),
        vec![0u8; 65_536],
        include_bytes!("native_roundtrip.rs").to_vec(),
    ];
    for data in data_set {
        let packed = ice.pack(&data).expect("pack");
        let (dsize, csize) = ice.depacked_size(&packed).expect("depacked size");
        assert_eq!(csize, packed.len());
        assert_eq!(dsize, data.len());
        assert_eq!(ice.depack(&packed).expect("depack"), data);
    }
}

#[test]
fn empty_and_damaged_inputs() {
    let Some(ice) = native_codec() else {
        eprintln!("UNICE68_TEST_LIB not set; skipping");
        return;
    };

    let empty = ice.pack(b"").expect("pack empty");
    assert_eq!(empty.len(), ICE_HEADER_LEN);
    assert!(ice.depack(&empty).expect("depack empty").is_empty());

    let packed = ice.pack(&noise(4096, 9)).expect("pack");
    let err = ice
        .depack(&packed[..packed.len() / 2])
        .expect_err("truncated");
    assert_eq!(err.kind(), ErrorKind::CorruptInput);

    let err = ice.depack(b"definitely not ice").expect_err("garbage");
    assert_eq!(err.kind(), ErrorKind::InvalidHeader);
}
