//! Antenna response models
//!
//! Four model families are supported, mirroring how aperture responses are
//! usually described for heterogeneous arrays:
//!
//! | Family        | Model                                  |
//! |---------------|----------------------------------------|
//! | Airy          | `2·J1(x)/x`, `x = π·D·r·f/c`           |
//! | Numeric       | tabulated radial profile, scaled in f  |
//! | ImageBased    | sampled 2-D pattern, scaled in f       |
//! | CommonPreset  | named telescope preset (blocked Airy)  |
//!
//! All models return the *voltage* pattern; the synthesizer multiplies two
//! of them to get the baseline response.

use std::collections::HashMap;

use super::AntennaResponseProvider;
use crate::array::KernelArray;
use crate::baseline::{Classification, ModelFamily};
use crate::grid::MuellerTerm;
use crate::key::AntennaClassId;
use crate::types::{Complex, DirectionOffset};

/// Speed of light in m/s
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Uniformly illuminated circular aperture with optional central blockage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AiryDisk {
    /// Dish diameter in metres
    pub diameter_m: f64,
    /// Blockage diameter in metres (0 for none)
    pub blockage_m: f64,
}

impl AiryDisk {
    pub fn new(diameter_m: f64) -> Self {
        Self {
            diameter_m,
            blockage_m: 0.0,
        }
    }

    pub fn with_blockage(mut self, blockage_m: f64) -> Self {
        self.blockage_m = blockage_m;
        self
    }

    /// Voltage pattern at sine-of-offset `r`.
    pub fn voltage(&self, r: f64, frequency_hz: f64) -> f64 {
        let x = std::f64::consts::PI * self.diameter_m * r * frequency_hz / SPEED_OF_LIGHT;
        if self.blockage_m <= 0.0 {
            return jinc(x);
        }
        let b = self.blockage_m / self.diameter_m;
        let b2 = b * b;
        (jinc(x) - b2 * jinc(b * x)) / (1.0 - b2)
    }
}

/// `2·J1(x)/x`, equal to 1 at the origin.
fn jinc(x: f64) -> f64 {
    if x.abs() < 1e-8 {
        1.0
    } else {
        2.0 * bessel_j1(x) / x
    }
}

/// Bessel function of the first kind, order 1
///
/// Rational approximation for |x| < 8, asymptotic form beyond.
pub fn bessel_j1(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 8.0 {
        let y = x * x;
        let num = x
            * (72362614232.0
                + y * (-7895059235.0
                    + y * (242396853.1
                        + y * (-2972611.439 + y * (15704.48260 + y * (-30.16036606))))));
        let den = 144725228442.0
            + y * (2300535178.0
                + y * (18583304.74 + y * (99447.43394 + y * (376.9991397 + y * 1.0))));
        num / den
    } else {
        let z = 8.0 / ax;
        let y = z * z;
        let xx = ax - 2.356194491;
        let p = 1.0
            + y * (0.183105e-2
                + y * (-0.3516396496e-4 + y * (0.2457520174e-5 + y * (-0.240337019e-6))));
        let q = 0.04687499995
            + y * (-0.2002690873e-3
                + y * (0.8449199096e-5 + y * (-0.88228987e-6 + y * 0.105787412e-6)));
        let ans = (0.636619772 / ax).sqrt() * (xx.cos() * p - z * xx.sin() * q);
        if x < 0.0 {
            -ans
        } else {
            ans
        }
    }
}

/// Tabulated radial voltage profile.
///
/// `radii` are offsets (sine of angle) at `reference_frequency_hz`; the
/// pattern scales inversely with frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericPattern {
    pub radii: Vec<f64>,
    pub gains: Vec<f64>,
    pub reference_frequency_hz: f64,
}

impl NumericPattern {
    pub fn new(radii: Vec<f64>, gains: Vec<f64>, reference_frequency_hz: f64) -> Self {
        Self {
            radii,
            gains,
            reference_frequency_hz,
        }
    }

    /// Tabulate an Airy disk, handy for tests and as a starting model.
    pub fn from_airy(disk: &AiryDisk, max_radius: f64, samples: usize, frequency_hz: f64) -> Self {
        let n = samples.max(2);
        let radii: Vec<f64> = (0..n).map(|i| max_radius * i as f64 / (n - 1) as f64).collect();
        let gains = radii.iter().map(|&r| disk.voltage(r, frequency_hz)).collect();
        Self::new(radii, gains, frequency_hz)
    }

    pub fn voltage(&self, r: f64, frequency_hz: f64) -> f64 {
        let r_ref = r * frequency_hz / self.reference_frequency_hz;
        let n = self.radii.len().min(self.gains.len());
        if n == 0 || r_ref > self.radii[n - 1] {
            return 0.0;
        }
        let idx = self.radii[..n].partition_point(|&x| x <= r_ref);
        if idx == 0 {
            return self.gains[0];
        }
        if idx >= n {
            return self.gains[n - 1];
        }
        let (r0, r1) = (self.radii[idx - 1], self.radii[idx]);
        let t = if r1 > r0 { (r_ref - r0) / (r1 - r0) } else { 0.0 };
        self.gains[idx - 1] * (1.0 - t) + self.gains[idx] * t
    }
}

/// Sampled 2-D complex voltage pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePattern {
    /// Pattern samples, origin at the array center
    pub pixels: KernelArray,
    /// Pixel increment in direction cosines at the reference frequency
    pub increment: f64,
    pub reference_frequency_hz: f64,
}

impl ImagePattern {
    pub fn new(pixels: KernelArray, increment: f64, reference_frequency_hz: f64) -> Self {
        Self {
            pixels,
            increment,
            reference_frequency_hz,
        }
    }

    /// Bilinear interpolation of the pattern.
    pub fn voltage(&self, offset: DirectionOffset, frequency_hz: f64) -> Complex {
        let scale = frequency_hz / self.reference_frequency_hz / self.increment;
        let c = self.pixels.center() as f64;
        let px = c + offset.0 * scale;
        let py = c + offset.1 * scale;
        let side = self.pixels.side();
        if px < 0.0 || py < 0.0 || px >= (side - 1) as f64 || py >= (side - 1) as f64 {
            return Complex::new(0.0, 0.0);
        }
        let (x0, y0) = (px.floor() as usize, py.floor() as usize);
        let (tx, ty) = (px - x0 as f64, py - y0 as f64);
        let p = &self.pixels;
        let top = p.get(x0, y0) * (1.0 - tx) + p.get(x0 + 1, y0) * tx;
        let bottom = p.get(x0, y0 + 1) * (1.0 - tx) + p.get(x0 + 1, y0 + 1) * tx;
        top * (1.0 - ty) + bottom * ty
    }
}

/// Named telescope preset.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonPreset {
    pub telescope: String,
    pub disk: AiryDisk,
}

impl CommonPreset {
    /// Look up a preset by telescope name (case-insensitive).
    pub fn named(telescope: &str) -> Option<Self> {
        let disk = match telescope.to_ascii_uppercase().as_str() {
            "VLA" | "EVLA" => AiryDisk::new(25.0).with_blockage(2.36),
            "ALMA" => AiryDisk::new(12.0).with_blockage(0.75),
            "ACA" => AiryDisk::new(7.0).with_blockage(0.75),
            "MEERKAT" => AiryDisk::new(13.5),
            "ATCA" => AiryDisk::new(22.0).with_blockage(2.0),
            _ => return None,
        };
        Some(Self {
            telescope: telescope.to_string(),
            disk,
        })
    }
}

/// Capability enum over the supported response families.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseModel {
    Airy(AiryDisk),
    Numeric(NumericPattern),
    ImageBased(ImagePattern),
    CommonPreset(CommonPreset),
}

impl ResponseModel {
    pub fn family(&self) -> ModelFamily {
        match self {
            ResponseModel::Airy(_) => ModelFamily::Airy,
            ResponseModel::Numeric(_) => ModelFamily::Numeric,
            ResponseModel::ImageBased(_) => ModelFamily::ImageBased,
            ResponseModel::CommonPreset(_) => ModelFamily::CommonPreset,
        }
    }

    pub fn voltage(&self, offset: DirectionOffset, frequency_hz: f64) -> Complex {
        let r = (offset.0 * offset.0 + offset.1 * offset.1).sqrt();
        match self {
            ResponseModel::Airy(disk) => Complex::new(disk.voltage(r, frequency_hz), 0.0),
            ResponseModel::Numeric(table) => Complex::new(table.voltage(r, frequency_hz), 0.0),
            ResponseModel::ImageBased(image) => image.voltage(offset, frequency_hz),
            ResponseModel::CommonPreset(preset) => {
                Complex::new(preset.disk.voltage(r, frequency_hz), 0.0)
            }
        }
    }
}

/// Map from antenna class to response model.
///
/// Only diagonal polarization terms are modelled; off-diagonal (leakage)
/// terms are reported as unsupported.
#[derive(Debug, Clone, Default)]
pub struct ResponseCatalog {
    models: HashMap<AntennaClassId, ResponseModel>,
}

impl ResponseCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class: AntennaClassId, model: ResponseModel) -> &mut Self {
        self.models.insert(class, model);
        self
    }

    pub fn get(&self, class: AntennaClassId) -> Option<&ResponseModel> {
        self.models.get(&class)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Airy models for every class whose family is `Airy`, sized from the
    /// class descriptor. Other families need their data inserted explicitly.
    pub fn airy_from(classification: &Classification) -> Self {
        let mut catalog = Self::new();
        for id in 0..classification.class_count() as u32 {
            let class = AntennaClassId(id);
            if let Some(desc) = classification.descriptor(class) {
                if desc.family == ModelFamily::Airy {
                    catalog.insert(class, ResponseModel::Airy(AiryDisk::new(desc.diameter_m)));
                }
            }
        }
        catalog
    }
}

impl AntennaResponseProvider for ResponseCatalog {
    fn evaluate(
        &self,
        class: AntennaClassId,
        offset: DirectionOffset,
        frequency_hz: f64,
        pol: MuellerTerm,
    ) -> Complex {
        match self.models.get(&class) {
            Some(model) if pol.is_diagonal() => model.voltage(offset, frequency_hz),
            _ => Complex::new(0.0, 0.0),
        }
    }

    fn supports(&self, class: AntennaClassId, pol: MuellerTerm) -> bool {
        pol.is_diagonal() && self.models.contains_key(&class)
    }
}
