use nedf::doctest_utils::NedfBuilder;
use nedf::layout::HEADER_SIZE;
use nedf::{decode_sample_value, NedfError, NedfFile, RecordLayout, NANOVOLTS_PER_COUNT};
use std::path::PathBuf;
use tempfile::TempDir;

fn write_file(dir: &TempDir, name: &str, builder: &NedfBuilder) -> PathBuf {
    let path = dir.path().join(name);
    builder.write_to(&path).unwrap();
    path
}

// 只写头部，不写数据记录
fn write_header_only(dir: &TempDir, name: &str, builder: &NedfBuilder) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, builder.build_header_block().unwrap()).unwrap();
    path
}

// 根据构建器中的原始值计算期望的物理值
fn expected_values(builder: &NedfBuilder, start: u64, count: u64, channels: &[usize]) -> Vec<f32> {
    let mut values = Vec::new();
    for sample in start..start + count {
        for &channel in channels {
            values.push(decode_sample_value(builder.raw_at(sample, channel)));
        }
    }
    values
}

#[test]
fn test_read_all_channels() {
    let dir = TempDir::new().unwrap();
    let builder = NedfBuilder::new(4, 23);
    let path = write_file(&dir, "all.nedf", &builder);

    let mut file = NedfFile::open(&path).unwrap();
    let values = file.read_samples(0, 23, &[]).unwrap();

    assert_eq!(values.len(), 4 * 23);
    assert_eq!(values, expected_values(&builder, 0, 23, &[0, 1, 2, 3]));
}

#[test]
fn test_read_selected_channels_in_given_order() {
    let dir = TempDir::new().unwrap();
    let builder = NedfBuilder::new(6, 40);
    let path = write_file(&dir, "select.nedf", &builder);

    let mut file = NedfFile::open(&path).unwrap();
    let values = file.read_samples(10, 5, &[5, 0, 3]).unwrap();

    assert_eq!(values, expected_values(&builder, 10, 5, &[5, 0, 3]));
}

#[test]
fn test_read_across_group_boundaries() {
    let dir = TempDir::new().unwrap();
    let builder = NedfBuilder::new(3, 50).accel_channels(3);
    let path = write_file(&dir, "groups.nedf", &builder);

    let mut file = NedfFile::open(&path).unwrap();

    // 从组中间开始，跨越多个加速度计数据块
    for (start, count) in [(3, 9), (4, 1), (4, 2), (5, 5), (7, 30), (49, 1)] {
        let values = file.read_samples(start, count, &[]).unwrap();
        assert_eq!(
            values,
            expected_values(&builder, start, count, &[0, 1, 2]),
            "start={} count={}",
            start,
            count
        );
    }
}

#[test]
fn test_read_with_stim_records() {
    let dir = TempDir::new().unwrap();
    let builder = NedfBuilder::new(4, 32).stim(8);
    let path = write_file(&dir, "stim.nedf", &builder);

    let mut file = NedfFile::open(&path).unwrap();
    assert_eq!(file.layout().record_size, 3 * 4 * 3 + 4);

    let values = file.read_samples(2, 27, &[1, 3]).unwrap();
    assert_eq!(values, expected_values(&builder, 2, 27, &[1, 3]));
}

#[test]
fn test_read_without_accelerometer() {
    let dir = TempDir::new().unwrap();
    let builder = NedfBuilder::new(2, 12).accel_channels(0);
    let path = write_file(&dir, "noaccel.nedf", &builder);

    let mut file = NedfFile::open(&path).unwrap();
    assert_eq!(file.layout().accel_block_size, 0);

    let values = file.read_samples(0, 12, &[]).unwrap();
    assert_eq!(values, expected_values(&builder, 0, 12, &[0, 1]));
}

#[test]
fn test_read_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let builder = NedfBuilder::new(4, 100);
    let path = write_file(&dir, "idem.nedf", &builder);

    let mut file = NedfFile::open(&path).unwrap();
    let first = file.read_samples(17, 33, &[2, 1]).unwrap();
    let _other = file.read_samples(80, 20, &[]).unwrap();
    let _markers = file.markers(None).unwrap();
    let second = file.read_samples(17, 33, &[2, 1]).unwrap();

    let first_bits: Vec<u32> = first.iter().map(|v| v.to_bits()).collect();
    let second_bits: Vec<u32> = second.iter().map(|v| v.to_bits()).collect();
    assert_eq!(first_bits, second_bits);

    let mut fresh = NedfFile::open(&path).unwrap();
    assert_eq!(fresh.read_samples(17, 33, &[2, 1]).unwrap(), first);
}

#[test]
fn test_first_and_last_sample() {
    let dir = TempDir::new().unwrap();
    let builder = NedfBuilder::new(2, 254);
    let path = write_file(&dir, "edges.nedf", &builder);

    let mut file = NedfFile::open(&path).unwrap();
    let first = file.read_samples(0, 1, &[0]).unwrap();
    let last = file.read_samples(253, 1, &[0]).unwrap();

    assert_eq!(first, vec![decode_sample_value(builder.raw_at(0, 0))]);
    assert_eq!(last, vec![decode_sample_value(builder.raw_at(253, 0))]);
}

#[test]
fn test_sample_range_error() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "range.nedf", &NedfBuilder::new(2, 20));

    let mut file = NedfFile::open(&path).unwrap();
    assert!(matches!(
        file.read_samples(15, 6, &[]),
        Err(NedfError::SampleRange { start: 15, count: 6, available: 20 })
    ));
    assert!(matches!(
        file.read_samples(u64::MAX, 2, &[]),
        Err(NedfError::SampleRange { .. })
    ));

    // 边界上的读取仍然有效
    assert_eq!(file.read_samples(15, 5, &[]).unwrap().len(), 10);
    assert!(file.read_samples(20, 0, &[]).unwrap().is_empty());
}

#[test]
fn test_invalid_channel_index() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "channel.nedf", &NedfBuilder::new(2, 20));

    let mut file = NedfFile::open(&path).unwrap();
    assert!(matches!(
        file.read_samples(0, 1, &[0, 2]),
        Err(NedfError::InvalidChannelIndex { index: 2, channels: 2 })
    ));
}

#[test]
fn test_special_raw_values() {
    let dir = TempDir::new().unwrap();
    let builder = NedfBuilder::new(3, 10)
        .raw_value(6, 0, 8_388_607)
        .raw_value(6, 1, -8_388_608)
        .raw_value(6, 2, -1);
    let path = write_file(&dir, "special.nedf", &builder);

    let mut file = NedfFile::open(&path).unwrap();
    let values = file.read_samples(6, 1, &[]).unwrap();

    assert!((values[0] as f64 - 8_388_607.0 * NANOVOLTS_PER_COUNT).abs() < 0.1);
    assert!((values[1] as f64 + 8_388_608.0 * NANOVOLTS_PER_COUNT).abs() < 0.1);
    assert_eq!(values[2], -1.0);
}

#[test]
fn test_magnitude_never_exceeds_full_scale() {
    let dir = TempDir::new().unwrap();
    let builder = NedfBuilder::new(8, 200);
    let path = write_file(&dir, "bound.nedf", &builder);

    let mut file = NedfFile::open(&path).unwrap();
    let bound = (8_388_607.0 * NANOVOLTS_PER_COUNT) as f32;
    for value in file.read_samples(0, 200, &[]).unwrap() {
        assert!(value.abs() <= bound);
    }
}

#[test]
fn test_truncated_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let builder = NedfBuilder::new(2, 20);
    let mut bytes = builder.build().unwrap();
    bytes.truncate(bytes.len() - 6);
    let path = dir.path().join("truncated.nedf");
    std::fs::write(&path, bytes).unwrap();

    let mut file = NedfFile::open(&path).unwrap();
    assert!(file.read_samples(0, 19, &[]).is_ok());
    assert!(matches!(file.read_samples(19, 1, &[]), Err(NedfError::Io(_))));
}

#[test]
fn test_layout_matches_file() {
    let dir = TempDir::new().unwrap();
    let builder = NedfBuilder::new(5, 37).accel_channels(3).stim(2);
    let bytes = builder.build().unwrap();
    let path = write_file(&dir, "layout.nedf", &builder);

    let file = NedfFile::open(&path).unwrap();
    let layout: RecordLayout = file.layout();

    assert_eq!(layout.seek_offset(0), Some(HEADER_SIZE + 6));
    // 最后一条记录正好结束在文件末尾
    assert_eq!(layout.seek_offset(36).unwrap() + layout.record_size, bytes.len() as u64);
}

#[test]
fn test_huge_record_count_without_data() {
    let dir = TempDir::new().unwrap();
    let path = write_header_only(&dir, "huge.nedf", &NedfBuilder::new(2, u64::MAX));

    let mut file = NedfFile::open(&path).unwrap();
    assert_eq!(file.header().record_count(), u64::MAX);

    // 头部声称的数据不存在，读取失败而不是预分配内存
    assert!(matches!(file.read_samples(0, u64::MAX / 2, &[]), Err(NedfError::Io(_))));
    assert!(matches!(file.read_samples(0, u64::MAX, &[1]), Err(NedfError::Io(_))));

    // 偏移量无法表示的样本
    assert!(matches!(
        file.read_samples(u64::MAX - 10, 1, &[]),
        Err(NedfError::SampleRange { start, count: 1, available: u64::MAX }) if start == u64::MAX - 10
    ));
    assert!(matches!(
        file.read_samples(u64::MAX / 2, 3, &[0]),
        Err(NedfError::SampleRange { .. })
    ));

    assert!(file.markers(Some(5)).is_err());
}

#[test]
fn test_record_count_larger_than_file() {
    let dir = TempDir::new().unwrap();
    let builder = NedfBuilder::new(3, 12);
    let mut bytes = NedfBuilder::new(3, 1_000_000_000).build_header_block().unwrap();
    bytes.extend_from_slice(&builder.build().unwrap()[HEADER_SIZE as usize..]);
    let path = dir.path().join("short.nedf");
    std::fs::write(&path, bytes).unwrap();

    let mut file = NedfFile::open(&path).unwrap();
    assert_eq!(
        file.read_samples(0, 12, &[]).unwrap(),
        expected_values(&builder, 0, 12, &[0, 1, 2])
    );
    assert!(matches!(file.read_samples(5, 999_999_000, &[]), Err(NedfError::Io(_))));
}
