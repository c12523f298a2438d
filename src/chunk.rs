//! Splitting a packed bitmap into firmware blocks and transport packets.

use crate::protocol::{MAX_LINES_PER_BLOCK, block_marker};

/// Largest payload one BLE write may carry.
pub const MAX_PACKET_BYTES: usize = 128;

/// One raster block: a marker followed by the packets holding its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'a> {
    /// `GS v 0` command declaring this block's width and line count.
    pub marker: [u8; 8],
    /// First raster line of the block.
    pub start_line: usize,
    pub lines: usize,
    pub packets: Vec<&'a [u8]>,
}

/// Splits data into chunks of given size.
///
/// - `data`: input bytes
/// - `chunk_size`: size of each chunk
///
/// Returns Vec of byte slices
pub fn chunk_data(data: &[u8], chunk_size: usize) -> Vec<&[u8]> {
    if chunk_size == 0 {
        return vec![data];
    }
    data.chunks(chunk_size).collect()
}

/// Splits a packed bitmap into blocks of at most `max_lines` rows, each
/// broken into packets of at most `max_packet_bytes`.
///
/// Limits above the firmware caps (255 lines, 128 bytes) and zero limits are
/// clamped into range, so no returned unit ever exceeds a cap.
///
/// Only whole rows present in `data` are emitted, so every marker declares
/// exactly the bytes of the packets after it. A zero `bytes_per_row` yields
/// no blocks.
pub fn chunk(
    data: &[u8],
    bytes_per_row: u16,
    total_lines: usize,
    max_lines: usize,
    max_packet_bytes: usize,
) -> Vec<Block<'_>> {
    let max_lines = max_lines.clamp(1, MAX_LINES_PER_BLOCK);
    let max_packet_bytes = max_packet_bytes.clamp(1, MAX_PACKET_BYTES);
    let stride = bytes_per_row as usize;
    if stride == 0 {
        return Vec::new();
    }
    let total_lines = usize::min(total_lines, data.len() / stride);

    let mut blocks = Vec::with_capacity(total_lines.div_ceil(max_lines));
    let mut start_line = 0;
    while start_line < total_lines {
        let lines = usize::min(total_lines - start_line, max_lines);
        let begin = start_line * stride;
        let slice = &data[begin..begin + lines * stride];
        blocks.push(Block {
            marker: block_marker(bytes_per_row, lines),
            start_line,
            lines,
            packets: chunk_data(slice, max_packet_bytes),
        });
        start_line += lines;
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared_lines(b: &Block) -> usize {
        u16::from_le_bytes([b.marker[6], b.marker[7]]) as usize
    }

    #[test]
    fn block_count_follows_height() {
        for height in [1usize, 254, 255, 256, 510, 511, 1000] {
            let data = vec![0xAA; 3 * height];
            let blocks = chunk(&data, 3, height, 255, 128);
            assert_eq!(blocks.len(), height.div_ceil(255), "height {height}");
            assert_eq!(blocks.iter().map(declared_lines).sum::<usize>(), height);
            for b in &blocks {
                assert_eq!(u16::from_le_bytes([b.marker[4], b.marker[5]]), 3);
                assert_eq!(declared_lines(b), b.lines);
            }
        }
    }

    #[test]
    fn packets_reassemble_block_slice() {
        let stride = 48usize;
        let height = 300usize;
        let data: Vec<u8> = (0..stride * height).map(|i| (i % 251) as u8).collect();
        let blocks = chunk(&data, stride as u16, height, 255, 128);
        assert_eq!(blocks.len(), 2);

        let mut rebuilt = Vec::new();
        for b in &blocks {
            let joined: Vec<u8> = b.packets.concat();
            let begin = b.start_line * stride;
            assert_eq!(joined, &data[begin..begin + b.lines * stride]);
            assert!(b.packets.iter().all(|p| p.len() <= 128));
            rebuilt.extend(joined);
        }
        assert_eq!(rebuilt, data);
        // 255 * 48 = 12240 bytes -> 95 full packets and one of 80
        assert_eq!(blocks[0].packets.len(), 96);
        assert_eq!(blocks[0].packets[95].len(), 80);
    }

    #[test]
    fn limits_are_clamped_to_firmware_caps() {
        let data = vec![0u8; 2 * 600];
        let blocks = chunk(&data, 2, 600, 10_000, 4096);
        assert!(blocks.iter().all(|b| b.lines <= 255));
        assert!(blocks.iter().flat_map(|b| &b.packets).all(|p| p.len() <= 128));

        let blocks = chunk(&data, 2, 600, 0, 0);
        assert_eq!(blocks.len(), 600);
        assert!(blocks[0].packets.iter().all(|p| p.len() == 1));
    }

    #[test]
    fn smaller_limits_are_honored() {
        let data = vec![0u8; 4 * 20];
        let blocks = chunk(&data, 4, 20, 8, 10);
        assert_eq!(blocks.iter().map(|b| b.lines).collect::<Vec<_>>(), vec![8, 8, 4]);
        assert_eq!(
            blocks[0].packets.iter().map(|p| p.len()).collect::<Vec<_>>(),
            vec![10, 10, 10, 2]
        );
    }

    #[test]
    fn short_data_declares_only_rows_present() {
        // 10 bytes at stride 4 hold two whole rows, not the 16 claimed
        let data = [0xFFu8; 10];
        let blocks = chunk(&data, 4, 16, 255, 128);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].marker, [0x1D, 0x76, 0x30, 0x00, 4, 0, 2, 0]);
        assert_eq!(blocks[0].lines, 2);
        assert_eq!(blocks[0].packets, vec![&data[..8]]);

        for b in chunk(&[0u8; 700], 4, 400, 100, 128) {
            let bytes: usize = b.packets.iter().map(|p| p.len()).sum();
            assert_eq!(bytes, declared_lines(&b) * 4);
        }
    }

    #[test]
    fn zero_stride_yields_no_blocks() {
        assert!(chunk(&[0u8; 8], 0, 8, 255, 128).is_empty());
        assert!(chunk(&[], 4, 8, 255, 128).is_empty());
    }

    #[test]
    fn chunk_data_zero_size_is_single_chunk() {
        let data = [1u8, 2, 3];
        assert_eq!(chunk_data(&data, 0), vec![&data[..]]);
        assert_eq!(chunk_data(&data, 2).len(), 2);
    }
}
