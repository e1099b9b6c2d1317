//! The closed set of supported instruments and what each one can do.
//!
//! Every instrument is described by a [`Capabilities`] record. Variants that
//! differ from their relatives in a constant or two simply carry different
//! values, so the session code only ever consults the record.

use super::Feature;

/// The wire protocol spoken by an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// The text command/response protocol, see [`line`](crate::line).
    Line,
    /// The register/FIFO protocol, see [`binary`](crate::binary).
    Binary,
}

/// The command used to program a sweep on line firmware.
///
/// Forms are ordered by capability, `ScanMask` being the most capable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SweepForm {
    /// `sweep <start> <stop> <points>`, after which each channel is read
    /// with its own `data` command.
    Sweep,
    /// `scan <start> <stop> <points>`.
    Scan,
    /// `scan <start> <stop> <points> <mask>`, which returns the frequencies
    /// or both channels in a single round trip.
    ScanMask,
}

impl SweepForm {
    /// The form unlocked by a firmware version, if any.
    pub fn for_version(version: &super::Version) -> Option<SweepForm> {
        if *version >= super::Version::new(0, 7, 1) {
            Some(SweepForm::ScanMask)
        } else if *version >= super::Version::new(0, 2, 0) {
            Some(SweepForm::Scan)
        } else {
            None
        }
    }

    /// The feature tag announcing the form.
    pub fn feature(self) -> Option<Feature> {
        match self {
            SweepForm::Sweep => None,
            SweepForm::Scan => Some(Feature::ScanCommand),
            SweepForm::ScanMask => Some(Feature::ScanMaskCommand),
        }
    }
}

/// How the [`SweepForm`] is chosen when a session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepSelection {
    /// Always the same form, whatever the firmware version.
    Fixed(SweepForm),
    /// The most capable of `floor` and the form the firmware version unlocks.
    ByVersion {
        /// The form used when the version unlocks nothing better.
        floor: SweepForm,
    },
}

/// What happens to the instrument's own sweep once a segmented acquisition is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResetSweep {
    /// Nothing is sent.
    Ignore,
    /// `sweep` over the full span, then `resume`.
    SweepAndResume,
    /// Reprogram the sweep registers over the full span.
    Reprogram,
}

/// How a `data` line encodes a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// `"<re> <im>"`.
    Complex,
    /// A single level in dB, converted to a linear magnitude with a zero
    /// imaginary part. Only the first channel exists; the second repeats it.
    Decibel,
}

/// The geometry of an instrument's display, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Screen {
    /// The width.
    pub width: u32,
    /// The height.
    pub height: u32,
}

impl Screen {
    /// Create a new geometry.
    pub const fn new(width: u32, height: u32) -> Self {
        Screen { width, height }
    }

    /// The number of pixels.
    pub const fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Everything that distinguishes one instrument from another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capabilities {
    /// The instrument's display name.
    pub name: &'static str,
    /// The wire protocol.
    pub dialect: Dialect,
    /// The accepted datapoint counts. The first is the default.
    pub valid_datapoints: &'static [u32],
    /// The smallest number of points per segment.
    pub points_min: u32,
    /// The largest number of points per segment.
    pub points_max: u32,
    /// The highest frequency the instrument can sweep to, in Hz.
    ///
    /// For the NanoVNA-V2 this is the figure for the older boards; the
    /// session raises it after reading the board revision.
    pub max_frequency: u64,
    /// The display that `capture` dumps, if the instrument supports it.
    pub screen: Option<Screen>,
    /// How the sweep command form is chosen.
    pub sweep_selection: SweepSelection,
    /// Program every sweep with a plain `scan`, whatever the chosen form.
    pub program_with_scan: bool,
    /// Send `trigger auto` after programming a sweep.
    pub trigger_after_sweep: bool,
    /// What [`reset_sweep`](super::Device::reset_sweep) does.
    pub reset: ResetSweep,
    /// How `data` lines encode samples.
    pub encoding: Encoding,
    /// If set, the feature set is exactly this and nothing is discovered.
    pub fixed_features: Option<&'static [Feature]>,
}

/// Datapoint counts of the original NanoVNA and its close relatives.
const STANDARD_POINTS: &[u32] = &[101, 51, 11];
/// The V2's counts, the largest of which loses a point to the S21 hack.
pub(crate) const V2_POINTS: &[u32] = &[101, 11, 51, 201, 301, 501, 1023];
/// The V2's counts on firmware needing the S21 hack.
pub(crate) const V2_HACK_POINTS: &[u32] = &[101, 11, 51, 201, 301, 501, 1021];

/// The base every line-protocol NanoVNA starts from.
const NANOVNA: Capabilities = Capabilities {
    name: "NanoVNA",
    dialect: Dialect::Line,
    valid_datapoints: STANDARD_POINTS,
    points_min: 11,
    points_max: 101,
    max_frequency: 300_000_000,
    screen: Some(Screen::new(320, 240)),
    sweep_selection: SweepSelection::ByVersion {
        floor: SweepForm::Sweep,
    },
    program_with_scan: false,
    trigger_after_sweep: false,
    reset: ResetSweep::SweepAndResume,
    encoding: Encoding::Complex,
    fixed_features: None,
};

/// The base of the tinySA spectrum analyzers.
const TINYSA: Capabilities = Capabilities {
    name: "tinySA",
    dialect: Dialect::Line,
    valid_datapoints: &[290],
    points_min: 11,
    points_max: 101,
    max_frequency: 950_000_000,
    screen: Some(Screen::new(320, 240)),
    sweep_selection: SweepSelection::Fixed(SweepForm::Sweep),
    program_with_scan: false,
    trigger_after_sweep: true,
    reset: ResetSweep::Ignore,
    encoding: Encoding::Decibel,
    fixed_features: Some(&[Feature::Screenshots]),
};

/// A supported instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// The original NanoVNA, and any line firmware that is not recognized.
    NanoVna,
    /// NanoVNA-H.
    NanoVnaH,
    /// NanoVNA-H4.
    NanoVnaH4,
    /// NanoVNA-F.
    NanoVnaF,
    /// NanoVNA-F V2.
    NanoVnaFV2,
    /// NanoVNA-V2 (S-A-A-2), the only instrument speaking the binary protocol.
    NanoVnaV2,
    /// AVNA, an audio-range analyzer on a Teensy.
    Avna,
    /// tinySA.
    TinySa,
    /// tinySA Ultra.
    TinySaUltra,
    /// JNCRadio VNA 3G.
    JncRadio3G,
    /// SV4401A.
    Sv4401a,
    /// SV6301A.
    Sv6301a,
}

/// Banner substrings and the variant they identify, most specific first.
const BANNERS: [(&str, Variant); 11] = [
    ("AVNA + Teensy", Variant::Avna),
    ("NanoVNA-H 4", Variant::NanoVnaH4),
    ("NanoVNA-H", Variant::NanoVnaH),
    ("NanoVNA-F_V2", Variant::NanoVnaFV2),
    ("NanoVNA-F", Variant::NanoVnaF),
    ("NanoVNA", Variant::NanoVna),
    ("tinySA4", Variant::TinySaUltra),
    ("tinySA", Variant::TinySa),
    ("JNCRadio_VNA_3G", Variant::JncRadio3G),
    ("SV4401A", Variant::Sv4401a),
    ("SV6301A", Variant::Sv6301a),
];

impl Variant {
    /// Every variant.
    pub const ALL: [Variant; 12] = [
        Variant::NanoVna,
        Variant::NanoVnaH,
        Variant::NanoVnaH4,
        Variant::NanoVnaF,
        Variant::NanoVnaFV2,
        Variant::NanoVnaV2,
        Variant::Avna,
        Variant::TinySa,
        Variant::TinySaUltra,
        Variant::JncRadio3G,
        Variant::Sv4401a,
        Variant::Sv6301a,
    ];

    /// Identify line firmware from the output of its `info` command.
    pub fn from_banner(banner: &str) -> Option<Variant> {
        BANNERS
            .iter()
            .find(|(needle, _)| banner.contains(needle))
            .map(|&(_, variant)| variant)
    }

    /// The instrument's capabilities.
    pub const fn capabilities(self) -> Capabilities {
        match self {
            Variant::NanoVna => NANOVNA,
            Variant::NanoVnaH => Capabilities {
                name: "NanoVNA-H",
                max_frequency: 1_500_000_000,
                ..NANOVNA
            },
            Variant::NanoVnaH4 => Capabilities {
                name: "NanoVNA-H4",
                valid_datapoints: &[101, 11, 51, 201, 401],
                max_frequency: 1_500_000_000,
                screen: Some(Screen::new(480, 320)),
                sweep_selection: SweepSelection::ByVersion {
                    floor: SweepForm::Scan,
                },
                ..NANOVNA
            },
            Variant::NanoVnaF => Capabilities {
                name: "NanoVNA-F",
                max_frequency: 1_500_000_000,
                screen: Some(Screen::new(800, 480)),
                ..NANOVNA
            },
            Variant::NanoVnaFV2 => Capabilities {
                name: "NanoVNA-F_V2",
                max_frequency: 3_000_000_000,
                screen: Some(Screen::new(800, 480)),
                ..NANOVNA
            },
            Variant::NanoVnaV2 => Capabilities {
                name: "NanoVNA-V2",
                dialect: Dialect::Binary,
                valid_datapoints: V2_POINTS,
                max_frequency: 3_000_000_000,
                screen: None,
                sweep_selection: SweepSelection::Fixed(SweepForm::Sweep),
                reset: ResetSweep::Reprogram,
                ..NANOVNA
            },
            Variant::Avna => Capabilities {
                name: "AVNA",
                max_frequency: 40_000,
                screen: None,
                sweep_selection: SweepSelection::Fixed(SweepForm::Sweep),
                ..NANOVNA
            },
            Variant::TinySa => TINYSA,
            Variant::TinySaUltra => Capabilities {
                name: "tinySA Ultra",
                valid_datapoints: &[450, 51, 101, 145, 290],
                max_frequency: 5_400_000_000,
                screen: Some(Screen::new(480, 320)),
                fixed_features: Some(&[Feature::Screenshots, Feature::CustomizableDatapoints]),
                ..TINYSA
            },
            Variant::JncRadio3G => Capabilities {
                name: "JNCRadio_VNA_3G",
                valid_datapoints: &[501, 11, 101, 1001],
                points_max: 1001,
                max_frequency: 3_000_000_000,
                screen: Some(Screen::new(800, 480)),
                ..NANOVNA
            },
            Variant::Sv4401a => Capabilities {
                name: "SV4401A",
                valid_datapoints: &[501, 101, 1001],
                points_min: 101,
                points_max: 1001,
                max_frequency: 4_400_000_000,
                screen: Some(Screen::new(1024, 600)),
                ..NANOVNA
            },
            Variant::Sv6301a => Capabilities {
                name: "SV6301A",
                valid_datapoints: &[501, 101, 1001],
                points_min: 101,
                points_max: 1001,
                max_frequency: 6_300_000_000,
                screen: Some(Screen::new(1024, 600)),
                program_with_scan: true,
                ..NANOVNA
            },
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.capabilities().name)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::device::Version;

    #[test]
    fn banners_match_most_specific_first() {
        let cases = [
            ("NanoVNA-H 4\nBoard: NanoVNA-H 4", Variant::NanoVnaH4),
            ("Board: NanoVNA-H", Variant::NanoVnaH),
            ("NanoVNA-F_V2 2022", Variant::NanoVnaFV2),
            ("Board: NanoVNA-F", Variant::NanoVnaF),
            ("Board: NanoVNA", Variant::NanoVna),
            ("tinySA4_v4.3", Variant::TinySaUltra),
            ("tinySA v1.3", Variant::TinySa),
            ("JNCRadio_VNA_3G", Variant::JncRadio3G),
            ("AVNA + Teensy", Variant::Avna),
            ("SV6301A", Variant::Sv6301a),
        ];
        for (banner, expected) in cases {
            assert_eq!(Variant::from_banner(banner), Some(expected), "{banner}");
        }
        assert_eq!(Variant::from_banner("Kernel: ChibiOS"), None);
    }

    #[test]
    fn default_datapoints_are_valid() {
        for variant in Variant::ALL {
            let caps = variant.capabilities();
            assert!(!caps.valid_datapoints.is_empty(), "{variant}");
            assert!(caps.points_min <= caps.points_max, "{variant}");
        }
    }

    #[test]
    fn sweep_form_by_version() {
        assert_eq!(SweepForm::for_version(&Version::parse("0.7.1")), Some(SweepForm::ScanMask));
        assert_eq!(SweepForm::for_version(&Version::parse("0.4.5")), Some(SweepForm::Scan));
        assert_eq!(SweepForm::for_version(&Version::parse("0.1.9")), None);
        assert!(SweepForm::Scan.max(SweepForm::Sweep) == SweepForm::Scan);
    }

    #[test]
    fn relatives_share_the_base() {
        let h = Variant::NanoVnaH.capabilities();
        assert_eq!(h.valid_datapoints, NANOVNA.valid_datapoints);
        assert_eq!(h.max_frequency, 1_500_000_000);
        assert_eq!(Variant::Sv6301a.capabilities().points_min, 101);
        assert!(Variant::Sv6301a.capabilities().program_with_scan);
        assert!(!Variant::Sv4401a.capabilities().program_with_scan);
        assert_eq!(Variant::TinySaUltra.capabilities().encoding, Encoding::Decibel);
        assert_eq!(Variant::NanoVnaV2.to_string(), "NanoVNA-V2");
    }
}
