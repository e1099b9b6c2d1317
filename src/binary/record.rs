use num_complex::Complex64;

/// One measurement from the FIFO.
///
/// On the wire a record is six little-endian `i32`s (forward, reflected and
/// through wave, each as real then imaginary), a little-endian `u16`
/// frequency index, and six bytes of padding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FifoRecord {
    /// The incident wave.
    pub forward: Complex64,
    /// The wave reflected back into port 1.
    pub reflected: Complex64,
    /// The wave arriving at port 2.
    pub through: Complex64,
    /// The position of the frequency within the sweep.
    pub freq_index: u16,
}

impl FifoRecord {
    /// The size of an encoded record.
    pub const LEN: usize = 32;

    /// Decode a record from the start of `bytes`.
    ///
    /// Returns `None` if fewer than [`LEN`](FifoRecord::LEN) bytes are given.
    pub fn decode(bytes: &[u8]) -> Option<FifoRecord> {
        if bytes.len() < Self::LEN {
            return None;
        }
        let word = |i: usize| {
            let at = i * 4;
            f64::from(i32::from_le_bytes([
                bytes[at],
                bytes[at + 1],
                bytes[at + 2],
                bytes[at + 3],
            ]))
        };
        Some(FifoRecord {
            forward: Complex64::new(word(0), word(1)),
            reflected: Complex64::new(word(2), word(3)),
            through: Complex64::new(word(4), word(5)),
            freq_index: u16::from_le_bytes([bytes[24], bytes[25]]),
        })
    }

    /// The reflection coefficient, reflected / forward.
    pub fn reflection(&self) -> Complex64 {
        self.reflected / self.forward
    }

    /// The transmission coefficient, through / forward.
    pub fn transmission(&self) -> Complex64 {
        self.through / self.forward
    }
}
