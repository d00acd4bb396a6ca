use plotters::style::RGBColor;

const SEQUENTIAL: [(u8, u8, u8); 5] = [
    (68, 1, 84),
    (59, 82, 139),
    (33, 145, 140),
    (94, 201, 98),
    (253, 231, 37),
];

const DIVERGING: [(u8, u8, u8); 3] = [(33, 102, 172), (247, 247, 247), (178, 24, 43)];

pub const MISSING: RGBColor = RGBColor(200, 200, 200);

fn ramp(stops: &[(u8, u8, u8)], t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (stops.len() - 1) as f64;
    let i = (scaled.floor() as usize).min(stops.len() - 2);
    let f = scaled - i as f64;
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * f).round() as u8;
    let (a, b) = (stops[i], stops[i + 1]);
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

/// Maps values to fill colours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColourScale {
    /// Low-to-high ramp between `min` and `max`.
    Sequential { min: f64, max: f64 },
    /// Blue-white-red ramp centred on zero.
    Diverging { limit: f64 },
}

impl ColourScale {
    pub fn sequential<'a>(values: impl IntoIterator<Item = &'a f64>) -> Self {
        let (min, max) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        if min.is_finite() {
            ColourScale::Sequential { min, max }
        } else {
            ColourScale::Sequential { min: 0.0, max: 1.0 }
        }
    }

    pub fn diverging<'a>(values: impl IntoIterator<Item = &'a f64>) -> Self {
        let limit = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(0.0f64, |acc, v| acc.max(v.abs()));
        ColourScale::Diverging { limit }
    }

    pub fn colour(&self, value: f64) -> RGBColor {
        if !value.is_finite() {
            return MISSING;
        }
        match *self {
            ColourScale::Sequential { min, max } => {
                let span = max - min;
                let t = if span > 0.0 { (value - min) / span } else { 0.5 };
                ramp(&SEQUENTIAL, t)
            }
            ColourScale::Diverging { limit } => {
                let t = if limit > 0.0 { 0.5 + 0.5 * value / limit } else { 0.5 };
                ramp(&DIVERGING, t)
            }
        }
    }

    pub fn describe(&self) -> String {
        match *self {
            ColourScale::Sequential { min, max } => format!("{:.3} to {:.3}", min, max),
            ColourScale::Diverging { limit } => format!("-{:.3} to {:.3}", limit, limit),
        }
    }
}

/// Fill colour for CV bin `bin` of `count`.
pub fn bin_colour(bin: usize, count: usize) -> RGBColor {
    if count <= 1 {
        return ramp(&SEQUENTIAL, 0.0);
    }
    ramp(&SEQUENTIAL, bin as f64 / (count - 1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_scale_spans_the_ramp() {
        let scale = ColourScale::sequential(&[2.0, 4.0, f64::NAN]);
        assert_eq!(scale, ColourScale::Sequential { min: 2.0, max: 4.0 });
        assert_eq!(scale.colour(2.0), RGBColor(68, 1, 84));
        assert_eq!(scale.colour(4.0), RGBColor(253, 231, 37));
        assert_eq!(scale.colour(10.0), RGBColor(253, 231, 37));
    }

    #[test]
    fn diverging_scale_is_white_at_zero() {
        let scale = ColourScale::diverging(&[-3.0, 1.0]);
        assert_eq!(scale, ColourScale::Diverging { limit: 3.0 });
        assert_eq!(scale.colour(0.0), RGBColor(247, 247, 247));
        assert_eq!(scale.colour(-3.0), RGBColor(33, 102, 172));
    }

    #[test]
    fn missing_values_are_grey() {
        let scale = ColourScale::sequential(Vec::<f64>::new().iter());
        assert_eq!(scale.colour(f64::NAN), MISSING);
    }

    #[test]
    fn bins_run_from_first_to_last_stop() {
        assert_eq!(bin_colour(0, 7), RGBColor(68, 1, 84));
        assert_eq!(bin_colour(6, 7), RGBColor(253, 231, 37));
    }
}
