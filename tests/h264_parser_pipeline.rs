//! H.264 码流解析集成测试

use h264pack::codec::parsers::h264::{
    NalUnitType, SpsParseOptions, classify_nal_type, count_frames, find_first_nal,
    find_start_code, iter_nal_units, parse_sps, parse_sps_with,
};
use h264pack::core::{BitReader, BitWriter, PackError};

fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================
// 码流构造
// ============================================================

/// 构造 SPS NAL (含头部字节)
///
/// `high_profile` 时写入 profile 100 及 4:2:0 扩展字段,
/// `scaling` 为 true 时写入 list0 (16 项) 与 list6 (默认矩阵).
fn build_sps_nal(width_mbs_minus1: u32, height_map_units_minus1: u32, high_profile: bool, scaling: bool) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(0x67, 8);
    bw.write_bits(if high_profile { 100 } else { 66 }, 8);
    bw.write_bits(0, 8); // constraint_set_flags
    bw.write_bits(40, 8); // level_idc
    bw.write_ue(0); // seq_parameter_set_id
    if high_profile {
        bw.write_ue(1); // chroma_format_idc
        bw.write_ue(0); // bit_depth_luma_minus8
        bw.write_ue(0); // bit_depth_chroma_minus8
        bw.write_flag(false); // qpprime_y_zero_transform_bypass_flag
        bw.write_flag(scaling);
        if scaling {
            for i in 0..8 {
                match i {
                    0 => {
                        bw.write_flag(true);
                        for _ in 0..16 {
                            bw.write_se(2);
                        }
                    }
                    6 => {
                        bw.write_flag(true);
                        bw.write_se(-8); // next_scale = 0, 使用默认矩阵
                    }
                    _ => bw.write_flag(false),
                }
            }
        }
    }
    bw.write_ue(0); // log2_max_frame_num_minus4
    bw.write_ue(0); // pic_order_cnt_type
    bw.write_ue(0); // log2_max_pic_order_cnt_lsb_minus4
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

/// SPS + PPS + IDR + P, 起始码长度混合
fn build_typical_annex_b() -> Vec<u8> {
    let mut data = Vec::new();

    // SPS (4字节起始码)
    data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
    data.extend_from_slice(&build_sps_nal(24, 14, false, false));

    // PPS (3字节起始码)
    data.extend_from_slice(&[0x00, 0x00, 0x01]);
    data.extend_from_slice(&[0x68, 0xCE, 0x38, 0x80]);

    // IDR 切片 (4字节起始码)
    data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
    data.extend_from_slice(&[0x65, 0x88, 0x80, 0x40, 0xFF, 0xFE]);

    // P 切片 (3字节起始码)
    data.extend_from_slice(&[0x00, 0x00, 0x01]);
    data.extend_from_slice(&[0x41, 0x9A, 0x01, 0x02, 0x03]);

    data
}

// ============================================================
// 起始码扫描与 NAL 分类
// ============================================================

#[test]
fn test_scan_mixed_start_codes() {
    let data = build_typical_annex_b();
    let types: Vec<NalUnitType> = iter_nal_units(&data).map(|nal| nal.nal_type).collect();
    assert_eq!(
        types,
        vec![
            NalUnitType::Sps,
            NalUnitType::Pps,
            NalUnitType::SliceIdr,
            NalUnitType::Slice
        ],
        "NAL 类型序列不正确"
    );

    for nal in iter_nal_units(&data) {
        assert_eq!(
            &data[nal.start_code_offset..nal.start_code_offset + 3],
            &[0x00, 0x00, 0x01],
            "报告的偏移处应为 3 字节起始码"
        );
        assert_eq!(
            classify_nal_type(&data, nal.start_code_offset),
            Some(nal.nal_type)
        );
    }
}

#[test]
fn test_find_start_code_positions() {
    let data = build_typical_annex_b();
    let first = find_start_code(&data, 0);
    assert_eq!(first, 1, "4 字节起始码应报告内部 3 字节起始码位置");
    let second = find_start_code(&data, first + 4);
    assert_eq!(&data[second..second + 4], &[0x00, 0x00, 0x01, 0x68]);
    assert_eq!(find_start_code(&data, data.len()), data.len());
}

#[test]
fn test_count_frames_sequence() {
    // 类型序列 [7, 8, 5, 1, 1] → 3 帧
    let mut data = Vec::new();
    for nal_type in [7u8, 8, 5, 1, 1] {
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x60 | nal_type, 0x11, 0x22]);
    }
    assert_eq!(count_frames(&data), 3);
    assert_eq!(count_frames(&build_typical_annex_b()), 2);
    assert_eq!(count_frames(&[]), 0);
}

// ============================================================
// SPS 解析
// ============================================================

#[test]
fn test_first_sps_dimensions() {
    init_test_logger();
    let data = build_typical_annex_b();
    let sps_nal = find_first_nal(&data, NalUnitType::Sps).expect("应找到 SPS");
    let sps = parse_sps(sps_nal.payload(&data), &SpsParseOptions::default()).unwrap();
    assert_eq!(sps.dimensions(), (400, 240));
    assert_eq!(sps.level_idc, 40);
}

#[test]
fn test_high_profile_scaling_lists_strict() {
    init_test_logger();
    let nal = build_sps_nal(79, 44, true, true);
    let options = SpsParseOptions {
        strict_scaling_list_parsing: true,
    };
    let sps = parse_sps(&nal[1..], &options).expect("严格模式应跳过 scaling_list");
    assert!(sps.seq_scaling_matrix_present_flag);
    assert!(!sps.scaling_matrix_skipped);
    assert_eq!(sps.dimensions(), (1280, 720));
}

#[test]
fn test_high_profile_scaling_lists_legacy() {
    let mut nal = build_sps_nal(79, 44, true, true);
    nal.extend_from_slice(&[0xFF; 32]);

    let mut fields: Vec<(&'static str, i64)> = Vec::new();
    let result = parse_sps_with(&nal[1..], &SpsParseOptions::default(), &mut fields);
    let sps = result.expect("补齐数据后非严格模式应能完成解析");
    assert!(sps.scaling_matrix_skipped);
    assert!(fields.contains(&("scaling_matrix_unparsed", -1)));
}

#[test]
fn test_truncated_sps_is_malformed() {
    let nal = build_sps_nal(24, 14, false, false);
    let err = parse_sps(&nal[1..5], &SpsParseOptions::default()).expect_err("截断 SPS 应失败");
    assert!(
        matches!(err, PackError::MalformedBitstream(_)),
        "应为 MalformedBitstream, actual={:?}",
        err
    );
}

// ============================================================
// Exp-Golomb 往返
// ============================================================

#[test]
fn test_exp_golomb_roundtrip_unsigned() {
    let mut bw = BitWriter::new();
    for k in 0..=1_000_000u32 {
        bw.write_ue(k);
    }
    let data = bw.finish();

    let mut br = BitReader::new(&data);
    for k in 0..=1_000_000u32 {
        assert_eq!(br.read_ue().unwrap(), k, "ue({}) 往返不一致", k);
    }
}

#[test]
fn test_exp_golomb_roundtrip_signed() {
    let mut bw = BitWriter::new();
    for k in -1_000_000..=1_000_000i32 {
        bw.write_se(k);
    }
    let data = bw.finish();

    let mut br = BitReader::new(&data);
    for k in -1_000_000..=1_000_000i32 {
        assert_eq!(br.read_se().unwrap(), k, "se({}) 往返不一致", k);
    }
}
