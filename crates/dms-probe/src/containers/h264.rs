//! A minimal H.264 SPS (Annex-B `nal_unit_type == 7`) reader: just enough
//! of the exp-Golomb bitstream to recover profile, level and dimensions.
//! Does not handle the cropping rectangle or scaling lists.

use super::ProbedVideo;

struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        BitReader { data, bit_pos: 0 }
    }

    fn bit(&mut self) -> Option<u32> {
        let byte = self.bit_pos / 8;
        if byte >= self.data.len() {
            return None;
        }
        let shift = 7 - (self.bit_pos % 8);
        self.bit_pos += 1;
        Some(((self.data[byte] >> shift) & 1) as u32)
    }

    fn bits(&mut self, n: u32) -> Option<u32> {
        let mut v = 0u32;
        for _ in 0..n {
            v = (v << 1) | self.bit()?;
        }
        Some(v)
    }

    fn ue(&mut self) -> Option<u32> {
        let mut zeros = 0;
        while self.bit()? == 0 {
            zeros += 1;
            if zeros > 32 {
                return None;
            }
        }
        if zeros == 0 {
            return Some(0);
        }
        let suffix = self.bits(zeros)?;
        Some((1u32 << zeros) - 1 + suffix)
    }
}

pub fn parse_sps(rbsp: &[u8], video: &mut ProbedVideo) {
    let mut r = BitReader::new(rbsp);
    let profile_idc = match r.bits(8) {
        Some(v) => v,
        None => return,
    };
    let _constraint_flags = r.bits(8);
    let level_idc = match r.bits(8) {
        Some(v) => v,
        None => return,
    };
    video.profile = Some(match profile_idc {
        66 => "Baseline".to_string(),
        77 => "Main".to_string(),
        100 => "High".to_string(),
        p => format!("0x{p:02x}"),
    });
    video.level = Some(format!("{:.1}", level_idc as f32 / 10.0));

    let _sps_id = r.ue();
    if matches!(profile_idc, 100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128) {
        let chroma_format_idc = r.ue().unwrap_or(1);
        if chroma_format_idc == 3 {
            let _separate_colour_plane = r.bit();
        }
        let _bit_depth_luma = r.ue();
        let _bit_depth_chroma = r.ue();
        let _qpprime_y_zero_transform_bypass = r.bit();
        if let Some(seq_scaling_matrix_present) = r.bit() {
            if seq_scaling_matrix_present == 1 {
                // Scaling lists are variable-length and not needed for
                // dimensions; bail out rather than misparse them.
                return;
            }
        }
    }
    let _log2_max_frame_num_minus4 = r.ue();
    let pic_order_cnt_type = r.ue().unwrap_or(0);
    if pic_order_cnt_type == 0 {
        let _log2_max_pic_order_cnt_lsb_minus4 = r.ue();
    } else if pic_order_cnt_type == 1 {
        let _delta_pic_order_always_zero = r.bit();
        let _offset_for_non_ref_pic = r.ue();
        let _offset_for_top_to_bottom_field = r.ue();
        let num_ref_frames_in_pic_order_cnt_cycle = r.ue().unwrap_or(0);
        for _ in 0..num_ref_frames_in_pic_order_cnt_cycle {
            let _ = r.ue();
        }
    }
    let _max_num_ref_frames = r.ue();
    let _gaps_in_frame_num_value_allowed = r.bit();
    let pic_width_in_mbs_minus1 = match r.ue() {
        Some(v) => v,
        None => return,
    };
    let pic_height_in_map_units_minus1 = match r.ue() {
        Some(v) => v,
        None => return,
    };
    let frame_mbs_only_flag = r.bit().unwrap_or(1);
    if frame_mbs_only_flag == 0 {
        let _mb_adaptive_frame_field_flag = r.bit();
        video.interlaced = true;
    }

    let width = (pic_width_in_mbs_minus1 + 1) * 16;
    let height_map_units = (pic_height_in_map_units_minus1 + 1)
        * if frame_mbs_only_flag == 1 { 1 } else { 2 };
    let height = height_map_units * 16;

    video.width = Some(width);
    video.height = Some(height);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitreader_reads_exp_golomb_zero() {
        // A single `1` bit decodes to ue(v) == 0.
        let data = [0b1000_0000];
        let mut r = BitReader::new(&data);
        assert_eq!(r.ue(), Some(0));
    }
}
