//! Coordinate reference system utilities built on top of the `proj` crate.

use geo::{Coord, LineString};
use proj::Proj;
use serde::{Deserialize, Serialize};

/// Representation of a coordinate reference system.
///
/// A CRS is stored internally as a definition string which can be an EPSG
/// identifier (`"EPSG:28992"`), a Proj4 definition or a WKT definition.  When
/// created from an EPSG code the numeric value is retained so that callers can
/// inspect it if necessary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crs {
    definition: String,
    epsg: Option<u32>,
}

/// Geographic (degree-based) EPSG codes this tool may encounter as input.
const GEOGRAPHIC_EPSG: &[u32] = &[4326, 4258, 4617, 4979];

impl Crs {
    /// Creates a new CRS from the given EPSG code.
    pub fn from_epsg(code: u32) -> Self {
        Self {
            definition: format!("EPSG:{}", code),
            epsg: Some(code),
        }
    }

    /// Creates a CRS from a Proj4 definition string.
    pub fn from_proj4(definition: &str) -> Self {
        Self {
            definition: definition.to_string(),
            epsg: None,
        }
    }

    /// Creates a CRS from a WKT definition string.
    pub fn from_wkt(definition: &str) -> Self {
        Self {
            definition: definition.to_string(),
            epsg: None,
        }
    }

    /// Returns the EPSG code for this CRS, if available.
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Returns the underlying definition string.
    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Common global CRS definition: WGS84 (EPSG:4326).
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// The working CRS for all distance and angle math: RD New / Amersfoort
    /// (EPSG:28992), the Dutch national grid.
    pub fn rd_new() -> Self {
        Self::from_epsg(28992)
    }

    /// Whether this CRS expresses coordinates in degrees rather than metres.
    ///
    /// Distance and buffer math is undefined in a geographic CRS; callers must
    /// reproject to a planar metric CRS first.
    pub fn is_geographic(&self) -> bool {
        match self.epsg {
            Some(code) => GEOGRAPHIC_EPSG.contains(&code),
            None => self.definition.contains("longlat") || self.definition.contains("CRS84"),
        }
    }

    /// Transforms an `(x, y)` coordinate from this CRS to the target CRS.
    pub fn transform_point(&self, target: &Crs, x: f64, y: f64) -> Option<(f64, f64)> {
        let proj = Proj::new_known_crs(&self.definition, &target.definition, None).ok()?;
        proj.convert((x, y)).ok()
    }

    /// Transforms every vertex of a polyline from this CRS to the target CRS.
    pub fn transform_line_string(
        &self,
        target: &Crs,
        line: &LineString<f64>,
    ) -> Option<LineString<f64>> {
        let proj = Proj::new_known_crs(&self.definition, &target.definition, None).ok()?;
        let mut vertices = Vec::with_capacity(line.0.len());
        for coord in &line.0 {
            let (x, y) = proj.convert((coord.x, coord.y)).ok()?;
            vertices.push(Coord { x, y });
        }
        Some(LineString(vertices))
    }
}
