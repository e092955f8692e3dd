//! Pre-defined vertical profile fixtures.

/// Raw code used for "no data" in generated files.
pub const NODATA: f64 = -9999.0;

/// Raw code used for "undetect" in generated files.
pub const UNDETECT: f64 = -9000.0;

/// Quantities written by vol2bird, in file order (heights excluded).
pub const VOL2BIRD_QUANTITIES: [&str; 15] = [
    "u", "v", "w", "ff", "dd", "sd_vvp", "gap", "eta", "dens", "dbz", "DBZH", "n", "n_dbz",
    "n_all", "n_dbz_all",
];

/// A typed scalar attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum FixtureAttr {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Description of a synthetic ODIM VP file.
#[derive(Debug, Clone)]
pub struct VpFixture {
    /// `what/source`
    pub source: String,
    pub date: String,
    pub time: String,
    pub object: String,
    pub lat: f64,
    pub lon: f64,
    pub height: f64,
    pub wavelength: f64,
    pub rcs_bird: f64,
    pub sd_vvp_thresh: f64,
    pub vcp: FixtureAttr,
    pub heights: Vec<f64>,
    pub variables: Vec<(String, Vec<f64>)>,
    pub nodata: f64,
    pub undetect: f64,
}

impl VpFixture {
    /// A vol2bird-like profile with `levels` heights spaced 200 m apart.
    ///
    /// Values are small exact binary fractions so their text form is
    /// predictable. `dens` at the lowest level is [`NODATA`] and `dbz` at
    /// the highest level is [`UNDETECT`].
    ///
    /// ```
    /// use test_utils::VpFixture;
    ///
    /// let vp = VpFixture::vol2bird("nosta", "20230311", "000500", 3);
    /// assert_eq!(vp.heights, vec![0.0, 200.0, 400.0]);
    /// assert_eq!(vp.file_name(), "nosta_vp_20230311T000500Z_0x9.h5");
    /// ```
    pub fn vol2bird(radar: &str, date: &str, time: &str, levels: usize) -> Self {
        let heights: Vec<f64> = (0..levels).map(|i| i as f64 * 200.0).collect();
        let variables = VOL2BIRD_QUANTITIES
            .iter()
            .map(|&quantity| {
                let mut values: Vec<f64> = (0..levels)
                    .map(|i| generated_value(quantity, i as f64))
                    .collect();
                if quantity == "dens" {
                    if let Some(first) = values.first_mut() {
                        *first = NODATA;
                    }
                }
                if quantity == "dbz" {
                    if let Some(last) = values.last_mut() {
                        *last = UNDETECT;
                    }
                }
                (quantity.to_string(), values)
            })
            .collect();

        Self {
            source: format!("WMO:01384,RAD:NO41,PLC:Stavanger,NOD:{}", radar),
            date: date.to_string(),
            time: time.to_string(),
            object: "VP".to_string(),
            lat: 58.8628,
            lon: 5.5678,
            height: 480.0,
            wavelength: 5.3,
            rcs_bird: 11.0,
            sd_vvp_thresh: 2.0,
            vcp: FixtureAttr::Int(12),
            heights,
            variables,
            nodata: NODATA,
            undetect: UNDETECT,
        }
    }

    /// File name in the vol2bird naming convention.
    pub fn file_name(&self) -> String {
        format!("{}_vp_{}T{}Z_0x9.h5", self.radar(), self.date, self.time)
    }

    /// The `NOD` entry of the source string.
    pub fn radar(&self) -> &str {
        self.source
            .split(',')
            .find_map(|entry| entry.strip_prefix("NOD:"))
            .unwrap_or("")
    }

    pub fn with_vcp(mut self, vcp: FixtureAttr) -> Self {
        self.vcp = vcp;
        self
    }

    pub fn with_object(mut self, object: &str) -> Self {
        self.object = object.to_string();
        self
    }

    /// Override one value of one quantity.
    pub fn with_value(mut self, quantity: &str, level: usize, value: f64) -> Self {
        if let Some((_, values)) = self.variables.iter_mut().find(|(q, _)| q == quantity) {
            values[level] = value;
        }
        self
    }
}

fn generated_value(quantity: &str, i: f64) -> f64 {
    match quantity {
        "u" => 1.5 + i,
        "v" => -0.5 - i,
        "w" => 0.25 * i,
        "ff" => 2.0 + i,
        "dd" => 90.0 + 10.0 * i,
        "sd_vvp" => 1.25,
        "gap" => i % 2.0,
        "eta" => 10.0 * i,
        "dens" => 0.5 * i,
        "dbz" => -5.0 + i,
        "DBZH" => 3.5 + i,
        "n" => 100.0 + i,
        "n_dbz" => 200.0 + i,
        "n_all" => 300.0 + i,
        "n_dbz_all" => 400.0 + i,
        _ => 0.0,
    }
}
