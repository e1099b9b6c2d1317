//! Opcodes.
//!
//! Every frame starts with one of these. `READ*` and `WRITE*` take a register
//! address from [`register`](super::register) next, followed by the payload
//! for writes.

define_codes! {
    { 0x00, nop },
    { 0x0D, indicate },
    { 0x10, read },
    { 0x11, read2 },
    { 0x12, read4 },
    { 0x18, readfifo },
    { 0x20, write },
    { 0x21, write2 },
    { 0x22, write4 },
    { 0x23, write8 },
    { 0x28, writefifo },
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(READFIFO, 0x18);
        assert_eq!(WRITE8, 0x23);
        assert_eq!(name(0x0D), Some("indicate"));
        assert_eq!(name(0x01), None);
    }
}
