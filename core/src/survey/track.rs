use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrackCrs {
    /// Longitude/latitude in degrees.
    LonLat,
    /// Same projected metres as the segments and grid.
    #[default]
    Projected,
}

/// Survey track polylines used for overplotting.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SurveyTrack {
    #[serde(default)]
    pub crs: TrackCrs,
    pub lines: Vec<Vec<[f64; 2]>>,
}

impl SurveyTrack {
    /// Returns the track in projected metres, reprojecting lon/lat when needed.
    pub fn projected(&self, projection: &EqualAreaProjection) -> SurveyTrack {
        match self.crs {
            TrackCrs::Projected => self.clone(),
            TrackCrs::LonLat => SurveyTrack {
                crs: TrackCrs::Projected,
                lines: self
                    .lines
                    .iter()
                    .map(|line| line.iter().map(|p| projection.forward(p[0], p[1])).collect())
                    .collect(),
            },
        }
    }
}

/// Spherical Lambert azimuthal equal-area projection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EqualAreaProjection {
    pub lon0: f64,
    pub lat0: f64,
}

const AUTHALIC_RADIUS_M: f64 = 6_371_007.2;

impl EqualAreaProjection {
    pub fn new(lon0: f64, lat0: f64) -> Self {
        Self { lon0, lat0 }
    }

    pub fn forward(&self, lon: f64, lat: f64) -> [f64; 2] {
        let phi = lat.to_radians();
        let phi0 = self.lat0.to_radians();
        let dlambda = (lon - self.lon0).to_radians();
        let denom = 1.0 + phi0.sin() * phi.sin() + phi0.cos() * phi.cos() * dlambda.cos();
        let k = (2.0 / denom).sqrt();
        let x = AUTHALIC_RADIUS_M * k * phi.cos() * dlambda.sin();
        let y = AUTHALIC_RADIUS_M
            * k
            * (phi0.cos() * phi.sin() - phi0.sin() * phi.cos() * dlambda.cos());
        [x, y]
    }
}
