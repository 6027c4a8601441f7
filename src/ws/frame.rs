/// FIN set, opcode 0x2 (binary)
const FIN_BINARY: u8 = 0b1000_0010;

/// Header of an unmasked binary data frame carrying `len` payload bytes.
pub fn frame_header(len: usize) -> Vec<u8> {
    let mut header = Vec::with_capacity(10);
    header.push(FIN_BINARY);

    if len < 126 {
        header.push(len as u8);
    } else if len <= u16::MAX as usize {
        header.push(126);
        header.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        header.push(127);
        header.extend_from_slice(&(len as u64).to_be_bytes());
    }

    header
}

/// Wrap `payload` into one complete binary frame.
pub fn encode_binary_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = frame_header(payload.len());
    frame.extend_from_slice(payload);
    frame
}
