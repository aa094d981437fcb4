const SUFFIX_IEC: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
const SUFFIX_SI: &[&str] = &["B", "kB", "MB", "GB", "TB", "PB", "EB"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Base {
    #[default]
    Iec,
    Si,
}

impl Base {
    const fn multiplier(self) -> u64 {
        match self {
            Base::Iec => 1024,
            Base::Si => 1000,
        }
    }

    fn suffixes(self) -> &'static [&'static str] {
        match self {
            Base::Iec => SUFFIX_IEC,
            Base::Si => SUFFIX_SI,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Scale {
    Raw,
    #[default]
    Human,
    /// Fixed power of the base: 1 = k, 2 = M, 3 = G, 4 = T.
    Fixed(u32),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UnitMode {
    pub base: Base,
    pub scale: Scale,
}

impl UnitMode {
    pub fn format(self, size: u64) -> String {
        let mult = self.base.multiplier();
        let suffixes = self.base.suffixes();
        match self.scale {
            Scale::Raw => size.to_string(),
            Scale::Fixed(exp) => {
                let div = mult.pow(exp) as f64;
                format!("{:.2}{}", size as f64 / div, suffixes[exp as usize])
            }
            Scale::Human => {
                let mut divs = 0;
                let mut cur = size;
                let mut last = size;
                while cur >= mult && divs + 1 < suffixes.len() {
                    last = cur;
                    cur /= mult;
                    divs += 1;
                }
                let fraction = if divs == 0 {
                    size as f64
                } else {
                    last as f64 / mult as f64
                };
                format!("{:.2}{}", fraction, suffixes[divs])
            }
        }
    }
}
