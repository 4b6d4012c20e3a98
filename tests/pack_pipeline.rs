//! 打包流程集成测试: 内存打包, 文件打包与检查

use std::fs;

use h264pack::core::{BitWriter, PackError};
use h264pack::format::{
    H264Header, HEADER_SIZE, PackConfig, PackOptions, SpsErrorPolicy, inspect_file, pack_file,
    pack_stream, unpack,
};

fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Baseline SPS NAL (含头部字节)
fn build_sps_nal(width_mbs_minus1: u32, height_map_units_minus1: u32) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(0x67, 8);
    bw.write_bits(66, 8); // profile_idc
    bw.write_bits(0xC0, 8); // constraint_set_flags
    bw.write_bits(30, 8); // level_idc
    bw.write_ue(0); // seq_parameter_set_id
    bw.write_ue(0); // log2_max_frame_num_minus4
    bw.write_ue(2); // pic_order_cnt_type
    bw.write_ue(1); // max_num_ref_frames
    bw.write_flag(false); // gaps_in_frame_num_value_allowed_flag
    bw.write_ue(width_mbs_minus1);
    bw.write_ue(height_map_units_minus1);
    bw.write_flag(true); // frame_mbs_only_flag
    bw.write_flag(true); // direct_8x8_inference_flag
    bw.write_flag(false); // frame_cropping_flag
    bw.write_flag(false); // vui_parameters_present_flag
    bw.write_flag(true); // rbsp_stop_one_bit
    bw.finish()
}

/// 400x496 码流: SPS + PPS + 1 个 IDR + `p_frames` 个 P slice
fn build_stream(p_frames: usize) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
    data.extend_from_slice(&build_sps_nal(24, 30));
    data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x68, 0xCE, 0x3C, 0x80]);
    data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0x21]);
    for i in 0..p_frames {
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0x41, 0x9A, (i as u8) | 0x80]);
    }
    data
}

#[test]
fn test_pack_stream_400x496() {
    init_test_logger();
    let data = build_stream(9);
    let packed = pack_stream(data.clone(), &PackOptions::default()).unwrap();
    let out = packed.to_vec();

    let mut expected = b"H264".to_vec();
    for v in [400u32, 496, 10, 42, data.len() as u32] {
        expected.extend_from_slice(&v.to_le_bytes());
    }
    assert_eq!(&out[..HEADER_SIZE], &expected[..], "头部字节不正确");
    assert_eq!(&out[HEADER_SIZE..], &data[..]);
}

#[test]
fn test_pack_file_writes_header_and_payload() {
    init_test_logger();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("cast_demo_400_496.h264");
    let output = dir.path().join("cast_demo_400_496_header.h264");
    let data = build_stream(4);
    fs::write(&input, &data).unwrap();

    let mut config = PackConfig::new(&input, &output);
    config.options.fps = 25.0;
    let report = pack_file(&config).unwrap();

    assert_eq!(report.bytes_written as usize, HEADER_SIZE + data.len());
    assert_eq!(report.header.frame_count, 5);
    assert_eq!(report.header.frame_time_ms, 40);

    let written = fs::read(&output).unwrap();
    let header = H264Header::parse(&written).unwrap();
    assert_eq!(header, report.header);
    assert_eq!((header.width, header.height), (400, 496));
    assert_eq!(&written[HEADER_SIZE..], &data[..], "原始码流应原样写出");
}

#[test]
fn test_pack_file_refuses_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.h264");
    let output = dir.path().join("out.h264");
    fs::write(&input, build_stream(1)).unwrap();
    fs::write(&output, b"existing").unwrap();

    let mut config = PackConfig::new(&input, &output);
    config.overwrite = false;
    let err = pack_file(&config).expect_err("不允许覆盖时应失败");
    match err {
        PackError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::AlreadyExists),
        other => panic!("应为 I/O 错误, actual={:?}", other),
    }
    assert_eq!(fs::read(&output).unwrap(), b"existing", "已有文件不应被修改");

    config.overwrite = true;
    pack_file(&config).unwrap();
    assert_eq!(&fs::read(&output).unwrap()[..4], b"H264");
}

#[test]
fn test_pack_file_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let config = PackConfig::new(dir.path().join("missing.h264"), dir.path().join("out.h264"));
    assert!(matches!(pack_file(&config), Err(PackError::Io(_))));
    assert!(!dir.path().join("out.h264").exists(), "失败时不应创建输出文件");
}

#[test]
fn test_pack_file_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stream.h264");
    let data = build_stream(2);
    fs::write(&path, &data).unwrap();

    pack_file(&PackConfig::new(&path, &path)).unwrap();
    let written = fs::read(&path).unwrap();
    let (header, payload) = unpack(&written).unwrap();
    assert_eq!(header.frame_count, 3);
    assert_eq!(payload, &data[..]);
}

#[test]
fn test_inspect_packed_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.h264");
    let output = dir.path().join("out.h264");
    fs::write(&input, build_stream(3)).unwrap();
    pack_file(&PackConfig::new(&input, &output)).unwrap();

    let report = inspect_file(&output, &PackOptions::default()).unwrap();
    assert_eq!(report.header.frame_count, 4);
    assert_eq!(report.summary.frame_count, 4);
    assert_eq!(
        (report.summary.width, report.summary.height),
        (report.header.width, report.header.height)
    );

    // 原始码流不是打包文件
    let err = inspect_file(&input, &PackOptions::default()).expect_err("未打包文件应失败");
    assert!(matches!(err, PackError::InvalidData(_)));
}

#[test]
fn test_sps_error_policy_end_to_end() {
    let mut data = vec![0x00, 0x00, 0x00, 0x01, 0x67, 0x64];
    data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x65, 0x88]);

    let err = pack_stream(data.clone(), &PackOptions::default()).expect_err("截断 SPS 应失败");
    assert!(matches!(err, PackError::MalformedBitstream(_)));

    let options = PackOptions {
        sps_error_policy: SpsErrorPolicy::Fallback,
        ..Default::default()
    };
    let packed = pack_stream(data, &options).unwrap();
    assert_eq!((packed.header.width, packed.header.height), (0, 0));
    assert_eq!(packed.header.frame_count, 1);
}
