//! Frame packing for uncompressed DIB video
//!
//! Screen captures arrive top-down with an arbitrary row stride. AVI `DIB `
//! frames with a positive height are stored bottom-up, with each row exactly
//! `width * 4` bytes (already DWORD aligned at 32 bpp).

use super::ContainerError;
use crate::capture::traits::FrameBuffer;

/// Pack `frame` into `out` as bottom-up rows without padding.
///
/// `out` is cleared and reused so the sampler does not allocate per tick.
pub fn pack_bottom_up(frame: &FrameBuffer, out: &mut Vec<u8>) -> Result<(), ContainerError> {
    let row_bytes = frame.width as usize * 4;
    let height = frame.height as usize;

    if frame.stride < row_bytes {
        return Err(ContainerError::InvalidFrame(format!(
            "stride {} shorter than row of {} bytes",
            frame.stride, row_bytes
        )));
    }
    if height > 0 && frame.data.len() < frame.stride * (height - 1) + row_bytes {
        return Err(ContainerError::InvalidFrame(format!(
            "buffer of {} bytes too small for {}x{} at stride {}",
            frame.data.len(),
            frame.width,
            frame.height,
            frame.stride
        )));
    }

    out.clear();
    out.reserve(row_bytes * height);
    for row in 0..height {
        let source_row = if frame.top_down { height - 1 - row } else { row };
        let start = source_row * frame.stride;
        out.extend_from_slice(&frame.data[start..start + row_bytes]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_rows(width: u32, stride: usize, rows: &[u8], top_down: bool) -> FrameBuffer {
        let mut data = Vec::new();
        for &value in rows {
            let mut row = vec![value; width as usize * 4];
            row.resize(stride, 0xEE);
            data.extend(row);
        }
        FrameBuffer {
            width,
            height: rows.len() as u32,
            stride,
            top_down,
            data,
        }
    }

    #[test]
    fn test_top_down_is_flipped() {
        let frame = frame_with_rows(2, 8, &[1, 2, 3], true);
        let mut out = Vec::new();
        pack_bottom_up(&frame, &mut out).unwrap();
        assert_eq!(out.len(), 2 * 4 * 3);
        assert!(out[0..8].iter().all(|&b| b == 3));
        assert!(out[8..16].iter().all(|&b| b == 2));
        assert!(out[16..24].iter().all(|&b| b == 1));
    }

    #[test]
    fn test_stride_padding_is_stripped() {
        let frame = frame_with_rows(3, 16, &[9, 8], true);
        let mut out = vec![0xAA; 100];
        pack_bottom_up(&frame, &mut out).unwrap();
        assert_eq!(out.len(), 3 * 4 * 2);
        assert!(!out.contains(&0xEE));
        assert!(out[0..12].iter().all(|&b| b == 8));
    }

    #[test]
    fn test_bottom_up_source_kept_in_order() {
        let frame = frame_with_rows(1, 4, &[5, 6], false);
        let mut out = Vec::new();
        pack_bottom_up(&frame, &mut out).unwrap();
        assert_eq!(out, vec![5, 5, 5, 5, 6, 6, 6, 6]);
    }

    #[test]
    fn test_short_stride_rejected() {
        let mut frame = frame_with_rows(4, 16, &[1], true);
        frame.stride = 8;
        assert!(pack_bottom_up(&frame, &mut Vec::new()).is_err());
    }

    #[test]
    fn test_truncated_buffer_rejected() {
        let mut frame = frame_with_rows(2, 8, &[1, 2], true);
        frame.data.truncate(10);
        assert!(pack_bottom_up(&frame, &mut Vec::new()).is_err());
    }
}
