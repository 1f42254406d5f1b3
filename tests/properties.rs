mod common;

use common::MemStorage;
use proptest::prelude::*;
use ssfs::fs::Volume;

const DEVICE_BLOCKS: usize = 256;

fn fresh_volume() -> Volume<MemStorage> {
    let storage = MemStorage::new(DEVICE_BLOCKS);
    Volume::format(storage.clone(), 32).expect("format");
    Volume::mount(storage).expect("mount")
}

proptest! {
    #[test]
    fn write_then_read_round_trips(data in prop::collection::vec(any::<u8>(), 1..8192)) {
        let mut volume = fresh_volume();
        let n = volume.create().unwrap();
        prop_assert_eq!(volume.write(n, 0, &data).unwrap(), data.len());
        prop_assert_eq!(volume.stat(n).unwrap() as usize, data.len());

        let mut buf = vec![0u8; data.len()];
        prop_assert_eq!(volume.read(n, 0, &mut buf).unwrap(), data.len());
        prop_assert_eq!(buf, data);
    }

    #[test]
    fn size_covers_every_write(
        first in prop::collection::vec(any::<u8>(), 1..4096),
        offset in 0u64..16_384,
        second in prop::collection::vec(any::<u8>(), 1..4096),
    ) {
        let mut volume = fresh_volume();
        let n = volume.create().unwrap();
        volume.write(n, 0, &first).unwrap();
        volume.write(n, offset, &second).unwrap();

        let expected = (first.len() as u64).max(offset + second.len() as u64);
        prop_assert_eq!(u64::from(volume.stat(n).unwrap()), expected);
    }

    #[test]
    fn a_gap_before_the_written_byte_reads_as_zeros(
        offset in 1u64..32_768,
        byte in 1u8..,
    ) {
        let mut volume = fresh_volume();
        let n = volume.create().unwrap();
        volume.write(n, offset, &[byte]).unwrap();

        let mut buf = vec![0xffu8; offset as usize + 1];
        prop_assert_eq!(volume.read(n, 0, &mut buf).unwrap(), buf.len());
        prop_assert!(buf[..offset as usize].iter().all(|&b| b == 0));
        prop_assert_eq!(buf[offset as usize], byte);
    }

    #[test]
    fn observations_survive_a_remount(
        data in prop::collection::vec(any::<u8>(), 1..4096),
        offset in 0u64..8192,
    ) {
        let storage = MemStorage::new(DEVICE_BLOCKS);
        Volume::format(storage.clone(), 32).unwrap();
        let mut volume = Volume::mount(storage.clone()).unwrap();
        let n = volume.create().unwrap();
        volume.write(n, offset, &data).unwrap();
        let mut before = vec![0u8; data.len()];
        volume.read(n, offset, &mut before).unwrap();
        volume.unmount().unwrap();

        let mut volume = Volume::mount(storage).unwrap();
        prop_assert_eq!(u64::from(volume.stat(n).unwrap()), offset + data.len() as u64);
        let mut after = vec![0u8; data.len()];
        prop_assert_eq!(volume.read(n, offset, &mut after).unwrap(), data.len());
        prop_assert_eq!(after, before);
    }
}
