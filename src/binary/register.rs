//! Register addresses.

define_codes! {
    { 0x00, sweep start },
    { 0x10, sweep step },
    { 0x20, sweep points },
    { 0x22, sweep vals per freq },
    { 0x26, raw samples mode },
    { 0x30, values fifo },
    { 0x42, adf4350 tx power },
    { 0xF0, device variant },
    { 0xF1, protocol version },
    { 0xF2, hardware revision },
    { 0xF3, fw major },
    { 0xF4, fw minor },
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(SWEEP_VALS_PER_FREQ, 0x22);
        assert_eq!(FW_MINOR, 0xF4);
        assert_eq!(name(0x30), Some("values fifo"));
        assert_eq!(name(0x31), None);
    }
}
